use std::net::TcpListener;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_session::configuration::JwtSettings;
use feed_session::error::DatabaseError;
use feed_session::routes::{SessionConfig, REFRESH_COOKIE};
use feed_session::startup::{run, Storage};
use feed_session::store::{CredentialStore, MemoryStore, RefreshTokenRecord};
use uuid::Uuid;
use reqwest::header::{AUTHORIZATION, COOKIE};
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    /// No cookie jar: refresh cookies are passed explicitly so stale ones
    /// can be replayed
    pub client: reqwest::Client,
}

fn test_jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "integration-access-secret".to_string(),
        refresh_secret: "integration-refresh-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 7 * 24 * 60 * 60,
        issuer: "feed-session-tests".to_string(),
    }
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    spawn_app_with(Storage::from_memory(store.clone()), store).await
}

/// `store` is the memory store behind `storage`, kept for assertions
async fn spawn_app_with(storage: Storage, store: Arc<MemoryStore>) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let jwt_config = test_jwt_settings();
    let session = SessionConfig {
        secure_cookie: false,
        refresh_max_age_seconds: jwt_config.refresh_token_expiry,
        access_expires_in: jwt_config.access_token_expiry,
        password_cost: 4,
    };

    let server = run(listener, storage, jwt_config, session).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn post_with_cookie(&self, path: &str, refresh_token: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .header(COOKIE, format!("{}={}", REFRESH_COOKIE, refresh_token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn get_me(&self, authorization: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/api/users/me", &self.address));
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Sign up the default user; returns the access token and refresh cookie value
    async fn signup(&self) -> (String, String) {
        let response = self.post_json("/auth/signup", &signup_body()).await;
        assert_eq!(201, response.status().as_u16());
        let refresh = refresh_cookie_value(&response).expect("signup must set the refresh cookie");
        let body: Value = response.json().await.unwrap();
        (body["access_token"].as_str().unwrap().to_string(), refresh)
    }
}

fn signup_body() -> Value {
    json!({
        "username": "jane_doe",
        "email": "jane@example.com",
        "password": "hunter22",
        "full_name": "Jane Doe",
        "bio": "hello"
    })
}

fn refresh_cookie_value(response: &reqwest::Response) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name() == REFRESH_COOKIE)
        .map(|c| c.value().to_string())
}

fn cookie_is_cleared(response: &reqwest::Response) -> bool {
    response
        .cookies()
        .any(|c| c.name() == REFRESH_COOKIE && c.value().is_empty())
}

/// Memory store whose consume step reports an outage
struct UnavailableOnConsume(Arc<MemoryStore>);

#[async_trait]
impl CredentialStore for UnavailableOnConsume {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), DatabaseError> {
        self.0.create(record).await
    }

    async fn find_one(
        &self,
        subject_id: Uuid,
        token_value: &str,
    ) -> Result<Option<RefreshTokenRecord>, DatabaseError> {
        self.0.find_one(subject_id, token_value).await
    }

    async fn delete_one(&self, token_value: &str) -> Result<u64, DatabaseError> {
        self.0.delete_one(token_value).await
    }

    async fn delete_matching(&self, _: Uuid, _: &str) -> Result<u64, DatabaseError> {
        Err(DatabaseError::Unavailable("connection refused".to_string()))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        self.0.delete_expired(now).await
    }
}

// --- Signup / Login ---

#[tokio::test]
async fn signup_returns_201_with_access_token_and_http_only_cookie() {
    let app = spawn_app().await;

    let response = app.post_json("/auth/signup", &signup_body()).await;
    assert_eq!(201, response.status().as_u16());

    let cookie = response
        .cookies()
        .find(|c| c.name() == REFRESH_COOKIE)
        .expect("refresh cookie missing");
    assert!(cookie.http_only());
    assert!(cookie.same_site_strict());
    assert!(!cookie.value().is_empty());
    let refresh = cookie.value().to_string();

    let body: Value = response.json().await.unwrap();
    assert!(body["access_token"].is_string());
    assert!(body.get("refresh_token").is_none());
    assert_eq!(body["user"]["username"], "jane_doe");
    assert!(body["user"].get("password_hash").is_none());

    assert!(app.store.contains_refresh_token(&refresh));
}

#[tokio::test]
async fn signup_returns_409_for_duplicate_account() {
    let app = spawn_app().await;
    app.signup().await;

    let response = app.post_json("/auth/signup", &signup_body()).await;
    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn signup_returns_400_for_invalid_input() {
    let app = spawn_app().await;

    let cases = vec![
        (json!({"username": "jane_doe", "email": "not-an-email", "password": "hunter22", "full_name": "Jane"}), "invalid email"),
        (json!({"username": "j", "email": "jane@example.com", "password": "hunter22", "full_name": "Jane"}), "short username"),
        (json!({"username": "jane_doe", "email": "jane@example.com", "password": "abc", "full_name": "Jane"}), "short password"),
        (json!({"email": "jane@example.com"}), "missing fields"),
    ];

    for (body, reason) in cases {
        let response = app.post_json("/auth/signup", &body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject: {}", reason);
    }
}

#[tokio::test]
async fn login_accepts_email_or_username() {
    let app = spawn_app().await;
    app.signup().await;

    for identifier in ["jane@example.com", "JANE_DOE"] {
        let response = app
            .post_json(
                "/auth/login",
                &json!({ "email_or_username": identifier, "password": "hunter22" }),
            )
            .await;

        assert_eq!(200, response.status().as_u16(), "login with {}", identifier);
        assert!(refresh_cookie_value(&response).is_some());
    }
}

#[tokio::test]
async fn login_returns_401_for_invalid_credentials() {
    let app = spawn_app().await;
    app.signup().await;

    let cases = vec![
        json!({ "email_or_username": "jane_doe", "password": "wrong-password" }),
        json!({ "email_or_username": "nobody", "password": "hunter22" }),
    ];

    for body in cases {
        let response = app.post_json("/auth/login", &body).await;
        assert_eq!(401, response.status().as_u16());
        assert!(refresh_cookie_value(&response).is_none());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }
}

#[tokio::test]
async fn login_from_same_device_retires_previous_refresh_token() {
    let app = spawn_app().await;
    let (_, first) = app.signup().await;

    let response = app
        .client
        .post(&format!("{}/auth/login", &app.address))
        .header(COOKIE, format!("{}={}", REFRESH_COOKIE, first))
        .json(&json!({ "email_or_username": "jane_doe", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let second = refresh_cookie_value(&response).unwrap();

    assert!(!app.store.contains_refresh_token(&first));
    assert!(app.store.contains_refresh_token(&second));
    assert_eq!(app.store.refresh_token_count(), 1);
}

// --- Refresh ---

#[tokio::test]
async fn refresh_rotates_the_cookie() {
    let app = spawn_app().await;
    let (_, first) = app.signup().await;

    let response = app.post_with_cookie("/auth/refresh", &first).await;
    assert_eq!(200, response.status().as_u16());
    let second = refresh_cookie_value(&response).expect("rotated cookie missing");
    assert_ne!(first, second);

    let body: Value = response.json().await.unwrap();
    let access = body["access_token"].as_str().unwrap();

    assert!(!app.store.contains_refresh_token(&first));
    assert!(app.store.contains_refresh_token(&second));

    let me = app.get_me(Some(&format!("Bearer {}", access))).await;
    assert_eq!(200, me.status().as_u16());
}

#[tokio::test]
async fn replayed_refresh_token_is_rejected_and_cookie_cleared() {
    let app = spawn_app().await;
    let (_, first) = app.signup().await;

    let response = app.post_with_cookie("/auth/refresh", &first).await;
    assert_eq!(200, response.status().as_u16());

    let replay = app.post_with_cookie("/auth/refresh", &first).await;
    assert_eq!(401, replay.status().as_u16());
    assert!(cookie_is_cleared(&replay));
    let body: Value = replay.json().await.unwrap();
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn concurrent_refreshes_with_one_token_have_one_winner() {
    let app = spawn_app().await;
    let (_, token) = app.signup().await;

    let (a, b) = tokio::join!(
        app.post_with_cookie("/auth/refresh", &token),
        app.post_with_cookie("/auth/refresh", &token),
    );
    let mut statuses = vec![a.status().as_u16(), b.status().as_u16()];
    statuses.sort();

    assert_eq!(statuses, vec![200, 401]);
    assert_eq!(app.store.refresh_token_count(), 1);
}

#[tokio::test]
async fn refresh_without_cookie_returns_missing_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/auth/refresh", &app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn refresh_during_store_outage_returns_503_and_clears_cookie() {
    let memory = Arc::new(MemoryStore::new());
    let storage = Storage {
        credentials: Arc::new(UnavailableOnConsume(memory.clone())),
        users: memory.clone(),
    };
    let app = spawn_app_with(storage, memory).await;
    let (_, refresh) = app.signup().await;

    let response = app.post_with_cookie("/auth/refresh", &refresh).await;

    assert_eq!(503, response.status().as_u16());
    assert!(cookie_is_cleared(&response));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    // The record was never consumed
    assert!(app.store.contains_refresh_token(&refresh));
}

#[tokio::test]
async fn access_token_cannot_be_used_as_refresh_token() {
    let app = spawn_app().await;
    let (access, _) = app.signup().await;

    let response = app.post_with_cookie("/auth/refresh", &access).await;
    assert_eq!(401, response.status().as_u16());
}

// --- Logout ---

#[tokio::test]
async fn logout_revokes_token_and_is_idempotent() {
    let app = spawn_app().await;
    let (_, token) = app.signup().await;

    for _ in 0..2 {
        let response = app.post_with_cookie("/auth/logout", &token).await;
        assert_eq!(200, response.status().as_u16());
        assert!(cookie_is_cleared(&response));
    }
    assert!(!app.store.contains_refresh_token(&token));

    let refresh = app.post_with_cookie("/auth/refresh", &token).await;
    assert_eq!(401, refresh.status().as_u16());

    let bare = app
        .client
        .post(&format!("{}/auth/logout", &app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(200, bare.status().as_u16());
}

// --- Protected routes ---

#[tokio::test]
async fn protected_route_distinguishes_missing_and_invalid_tokens() {
    let app = spawn_app().await;
    let (access, refresh) = app.signup().await;

    let missing = app.get_me(None).await;
    assert_eq!(401, missing.status().as_u16());
    assert!(refresh_cookie_value(&missing).is_none());
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_TOKEN");

    let invalid = app.get_me(Some("Bearer not.a.jwt")).await;
    assert_eq!(401, invalid.status().as_u16());
    assert!(refresh_cookie_value(&invalid).is_none());
    let body: Value = invalid.json().await.unwrap();
    assert_eq!(body["code"], "TOKEN_INVALID");

    // A refresh token is not an access token
    let wrong_class = app.get_me(Some(&format!("Bearer {}", refresh))).await;
    assert_eq!(401, wrong_class.status().as_u16());

    let ok = app.get_me(Some(&format!("Bearer {}", access))).await;
    assert_eq!(200, ok.status().as_u16());
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["email"], "jane@example.com");

    // Failed protected requests never revoke the session
    assert!(app.store.contains_refresh_token(&refresh));
}

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/health_check", &app.address))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

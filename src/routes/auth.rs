/// Authentication Routes
///
/// Signup, login, token refresh and logout. The refresh token never appears
/// in a response body: it travels only in an HttpOnly cookie scoped to this
/// site.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, RefreshCoordinator, TokenIssuer, TokenPair};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::store::{User, UserStore};
use crate::validators::{is_present, is_valid_bio, is_valid_email, is_valid_full_name, is_valid_username};

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Per-deployment knobs for the auth endpoints
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Set the `Secure` flag on the refresh cookie
    pub secure_cookie: bool,
    pub refresh_max_age_seconds: i64,
    pub access_expires_in: i64,
    pub password_cost: u32,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub bio: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email_or_username: String,
    pub password: String,
}

/// Returned by signup and login
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Returned by refresh
#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn refresh_cookie(config: &SessionConfig, value: String) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, value)
        .http_only(true)
        .secure(config.secure_cookie)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(config.refresh_max_age_seconds))
        .finish()
}

fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut cookie = refresh_cookie(config, String::new());
    cookie.make_removal();
    cookie
}

fn presented_refresh_token(req: &HttpRequest) -> Option<String> {
    req.cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn session_response(
    mut builder: actix_web::HttpResponseBuilder,
    pair: TokenPair,
    user: User,
    config: &SessionConfig,
) -> HttpResponse {
    builder
        .cookie(refresh_cookie(config, pair.refresh_token))
        .json(AuthResponse {
            access_token: pair.access_token,
            token_type: "Bearer".to_string(),
            expires_in: config.access_expires_in,
            user,
        })
}

/// POST /auth/signup
///
/// Create an account and start a session.
///
/// # Errors
/// - 400: Validation errors
/// - 409: Email or username already registered
/// - 503: Store unavailable
pub async fn signup(
    form: web::Json<SignupRequest>,
    users: web::Data<dyn UserStore>,
    issuer: web::Data<TokenIssuer>,
    config: web::Data<SessionConfig>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_signup");
    let form = form.into_inner();

    let username = is_valid_username(&form.username)?;
    let email = is_valid_email(&form.email)?;
    let full_name = is_valid_full_name(&form.full_name)?;
    let bio = is_valid_bio(form.bio.as_deref())?;

    let cost = config.password_cost;
    let password = form.password;
    let password_hash = web::block(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))??;

    let user = User {
        id: Uuid::new_v4(),
        username,
        email,
        password_hash,
        full_name,
        bio,
        created_at: Utc::now(),
    };
    users.create_user(&user).await?;

    let pair = issuer.mint(user.id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        subject_id = %user.id,
        "User signed up"
    );

    Ok(session_response(HttpResponse::Created(), pair, user, &config))
}

/// POST /auth/login
///
/// Authenticate with email or username and password.
///
/// A refresh cookie already held by this client is retired first, so
/// logging in again on the same device does not leave an orphaned session.
/// Sessions on other devices are untouched.
///
/// # Errors
/// - 400: Missing fields
/// - 401: Invalid credentials (same answer for unknown user and bad password)
/// - 503: Store unavailable
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    users: web::Data<dyn UserStore>,
    issuer: web::Data<TokenIssuer>,
    coordinator: web::Data<RefreshCoordinator>,
    config: web::Data<SessionConfig>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let form = form.into_inner();

    let identifier = is_present("email_or_username", &form.email_or_username)?;
    if form.password.is_empty() {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let user = users
        .find_by_login(&identifier)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let password = form.password;
    let password_hash = user.password_hash.clone();
    let password_valid = web::block(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))??;
    if !password_valid {
        return Err(AuthError::InvalidCredentials.into());
    }

    if let Some(previous) = presented_refresh_token(&req) {
        if let Err(e) = coordinator.invalidate(&previous).await {
            context.clone().with_user_id(user.id.to_string()).log_error(&e);
        }
    }

    let pair = issuer.mint(user.id).await?;

    tracing::info!(
        request_id = %context.request_id,
        subject_id = %user.id,
        "User logged in"
    );

    Ok(session_response(HttpResponse::Ok(), pair, user, &config))
}

/// POST /auth/refresh
///
/// Rotate the refresh cookie and issue a new access token.
///
/// # Errors
/// - 401: Missing, invalid, expired or revoked refresh token
/// - 503: Store unavailable
///
/// The cookie is cleared on every failure.
pub async fn refresh(
    req: HttpRequest,
    coordinator: web::Data<RefreshCoordinator>,
    config: web::Data<SessionConfig>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let outcome = match presented_refresh_token(&req) {
        Some(presented) => coordinator.rotate(&presented).await,
        None => Err(AuthError::MissingToken.into()),
    };

    match outcome {
        Ok((subject_id, pair)) => {
            tracing::info!(
                request_id = %context.request_id,
                subject_id = %subject_id,
                "Token refreshed"
            );

            Ok(HttpResponse::Ok()
                .cookie(refresh_cookie(&config, pair.refresh_token))
                .json(RefreshResponse {
                    access_token: pair.access_token,
                    token_type: "Bearer".to_string(),
                    expires_in: config.access_expires_in,
                }))
        }
        Err(e) => {
            let mut response = e.error_response();
            response
                .add_cookie(&removal_cookie(&config))
                .map_err(|e| AppError::Internal(format!("Failed to clear cookie: {}", e)))?;
            Ok(response)
        }
    }
}

/// POST /auth/logout
///
/// Revoke the presented refresh token, if any, and clear the cookie.
/// Always succeeds.
pub async fn logout(
    req: HttpRequest,
    coordinator: web::Data<RefreshCoordinator>,
    config: web::Data<SessionConfig>,
) -> HttpResponse {
    let context = ErrorContext::new("user_logout");

    if let Some(presented) = presented_refresh_token(&req) {
        if let Err(e) = coordinator.invalidate(&presented).await {
            context.log_error(&e);
        }
    }

    HttpResponse::Ok()
        .cookie(removal_cookie(&config))
        .json(serde_json::json!({ "message": "Logged out" }))
}

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{RefreshCoordinator, TokenIssuer};
use crate::configuration::{JwtSettings, Settings};
use crate::error::{AppError, ValidationError};
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{get_current_user, health_check, login, logout, refresh, signup, SessionConfig};
use crate::store::{CredentialStore, MemoryStore, PgStore, UserStore};

/// The persistence collaborators the server is wired with
#[derive(Clone)]
pub struct Storage {
    pub credentials: Arc<dyn CredentialStore>,
    pub users: Arc<dyn UserStore>,
}

impl Storage {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            credentials: store.clone(),
            users: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    /// Share one in-memory store, keeping a handle for inspection
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            credentials: store.clone(),
            users: store,
        }
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            secure_cookie: settings.application.environment.is_production(),
            refresh_max_age_seconds: settings.jwt.refresh_token_expiry,
            access_expires_in: settings.jwt.access_token_expiry,
            password_cost: settings.application.password_cost,
        }
    }
}

pub fn run(
    listener: TcpListener,
    storage: Storage,
    jwt_config: JwtSettings,
    session: SessionConfig,
) -> Result<Server, std::io::Error> {
    let issuer = TokenIssuer::new(&jwt_config, storage.credentials.clone());
    let coordinator = RefreshCoordinator::new(issuer.clone());
    let access_keys = issuer.access_keys().clone();

    let issuer = web::Data::new(issuer);
    let coordinator = web::Data::new(coordinator);
    let users: web::Data<dyn UserStore> = web::Data::from(storage.users);
    let session = web::Data::new(session);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(issuer.clone())
            .app_data(coordinator.clone())
            .app_data(users.clone())
            .app_data(session.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::Validation(ValidationError::InvalidFormat(err.to_string())).into()
            }))
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout)),
            )
            // Protected routes (require an access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(access_keys.clone()))
                    .route("/users/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

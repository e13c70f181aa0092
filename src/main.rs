use std::net::TcpListener;
use std::time::Duration;

use feed_session::configuration::get_configuration;
use feed_session::expiration::start_expiration_cleaner;
use feed_session::routes::SessionConfig;
use feed_session::startup::{run, Storage};
use feed_session::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    if let Err(e) = configuration.jwt.validate() {
        tracing::error!(error = %e, "Invalid JWT configuration");
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    if let Err(e) = configuration.application.validate() {
        tracing::error!(error = %e, "Invalid application configuration");
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    let storage = if configuration.application.in_memory_store {
        tracing::warn!("Using in-memory store; sessions will not survive a restart");
        Storage::in_memory()
    } else {
        tracing::info!("Attempting to connect to database");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&configuration.database.connection_string())
            .await
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Database connection error",
                )
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
            })?;

        tracing::info!("Database ready");
        Storage::postgres(pool)
    };

    let cleaner = start_expiration_cleaner(
        storage.credentials.clone(),
        Duration::from_secs(configuration.application.cleanup_interval_seconds),
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!(
        address = %address,
        environment = ?configuration.application.environment,
        "Server listening"
    );

    let session = SessionConfig::from_settings(&configuration);
    let server = run(listener, storage, configuration.jwt.clone(), session)?;

    let result = server.await;
    cleaner.abort();
    result
}

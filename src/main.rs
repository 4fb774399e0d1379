//! Academic Service Server
//!
//! Runs the HTTP API with every area enabled. Deployments that only need
//! the back office or the portals can build their own router with
//! `RouterBuilder`.

use std::sync::Arc;

use axum::http::HeaderValue;
use dotenv::dotenv;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use academic_service::{
    api::{AppState, RouterBuilder},
    config::AppConfig,
    service::EmailService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv().ok();

    env_logger::init();

    log::info!("Starting Academic Service v{}", academic_service::VERSION);

    let config = AppConfig::from_env()?;
    config.validate()?;

    log::info!(
        "Configuration loaded (profile: {})",
        config.security.profile
    );

    let database_pool = config.database.create_pool().await?;

    log::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&database_pool).await?;
    log::info!("Database migrations completed");

    let email_service = match &config.email {
        Some(email_config) => match EmailService::new(email_config.clone()) {
            Ok(service) => {
                log::info!("Credential mails enabled via {}", email_config.smtp_host);
                Some(Arc::new(service))
            }
            Err(e) => {
                log::warn!("Email service unavailable, credential mails disabled: {}", e);
                None
            }
        },
        None => {
            log::warn!("Email service not configured, credential mails disabled");
            None
        }
    };

    tokio::fs::create_dir_all(&config.uploads.dir).await?;
    log::info!(
        "Teaching material stored under {} (max {} bytes)",
        config.uploads.dir.display(),
        config.uploads.max_bytes
    );

    let app_state = AppState::new(
        database_pool,
        email_service,
        config.security.bcrypt_cost,
        config.uploads.clone(),
    );

    let cors = if config.allows_any_origin() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = config
            .server
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS origin {}", origin);
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = RouterBuilder::with_all_routes()
        .max_upload_bytes(config.uploads.max_bytes)
        .build()
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .into_inner(),
        );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

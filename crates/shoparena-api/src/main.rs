//! Shoparena API Server
//!
//! REST API server for the Shoparena marketplace.
//!
//! Author: Shoparena developers

use anyhow::Context;
use shoparena_api::state::{AppState, Stores};
use shoparena_api::{create_router, mailer, uploads};
use shoparena_core::config::{AppConfig, LoggingConfig};
use shoparena_core::postgres::{self, PgStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration; SHOPARENA_CONFIG names an optional TOML file
    let file = std::env::var_os("SHOPARENA_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(file).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    config.auth.validate().context("Invalid JWT secret")?;
    if config.auth.uses_development_secret() {
        tracing::warn!("JWT_SECRET is not set; using the development secret");
    }

    let pool = postgres::connect(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    PgStore::new(pool.clone())
        .migrate()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations applied");

    let mailer = mailer::from_config(&config.mail).context("Invalid mail configuration")?;
    let object_store = uploads::from_config(&config.storage);
    if config.storage.upload_url.is_none() {
        tracing::warn!("OBJECT_STORE_URL is not set; profile image uploads are disabled");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(
        config,
        Stores::postgres(pool),
        mailer,
        object_store,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Shoparena API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "shoparena_api={0},shoparena_core={0},audit=info,tower_http=debug",
            logging.level
        )
        .into()
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

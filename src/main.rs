use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use courtbook::auth::TokenVerifier;
use courtbook::config::{AppConfig, DEFAULT_SECRET_KEY};
use courtbook::db;
use courtbook::handlers;
use courtbook::services::access::HttpAccessControl;
use courtbook::services::courts::HttpCourtRegistry;
use courtbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.secret_key == DEFAULT_SECRET_KEY {
        tracing::warn!("SECRET_KEY is not set, falling back to the built-in development key");
    }

    let conn = db::init_db(&config.database_url)?;

    tracing::info!(
        courts = %config.courts_service_url,
        roles = %config.roles_service_url,
        timeout_ms = config.service_timeout.as_millis() as u64,
        "using remote collaborators"
    );
    let courts = HttpCourtRegistry::new(config.courts_service_url.clone(), config.service_timeout)?;
    let access = HttpAccessControl::new(config.roles_service_url.clone(), config.service_timeout)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        tokens: TokenVerifier::new(&config.secret_key),
        config: config.clone(),
        courts: Box::new(courts),
        access: Box::new(access),
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

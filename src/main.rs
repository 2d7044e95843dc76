use anyhow::Context;
use tracing_subscriber::EnvFilter;

use hse_api_rust::{app, config, database::DatabaseManager, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting HSE API in {:?} mode", config.environment);
    if hse_api_rust::is_development!() {
        tracing::warn!("Development mode: using the built-in JWT secret unless JWT_SECRET is set");
    }

    let state = AppState::from_config(config).await.context("failed to initialise application state")?;
    let app = app::router(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("HSE API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    DatabaseManager::close().await;
    Ok(())
}

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use zaytoonz_api::{app, config, database::DatabaseManager, is_production};

const DEFAULT_LOG_FILTER: &str = "zaytoonz_api=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SUPABASE_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let config = config::config();
    tracing::info!("Starting Zaytoonz API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        if is_production!() {
            tracing::warn!("SUPABASE_JWT_SECRET is not set; bearer tokens will be rejected");
        } else {
            tracing::info!("SUPABASE_JWT_SECRET is not set; only ?userId= identities will resolve");
        }
    }

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Zaytoonz API listening on http://{}", bind_addr);

    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

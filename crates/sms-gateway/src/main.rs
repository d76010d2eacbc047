//! SMS gateway server.

use database::Database;
use sms_gateway::{AppState, Config};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    info!("Starting SMS gateway...");
    info!("Database: {}", config.database_url);
    if config.public_base_url.is_none() {
        info!("PUBLIC_BASE_URL not set; status callbacks are disabled");
    }

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let state = AppState::from_config(db.clone(), &config)?;
    let app = sms_gateway::app(state);

    let listener = TcpListener::bind(config.addr).await?;
    info!("Listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

//! frame-pool bridge server entry point.
//!
//! Hosts one message pool and exposes it to WebSocket peers at `/ws`.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use frame_pool::api;
use frame_pool::app_state::AppState;
use frame_pool::config::BridgeConfig;
use frame_pool::pool::TokioScheduler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = BridgeConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, pool = %config.pool_name, "starting frame-pool bridge");

    // Build the pool and bind it to the bridge transport
    let scheduler = Arc::new(TokioScheduler::current()?);
    let app_state = AppState::from_config(&config, scheduler)?;

    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

//! textcad HTTP server
//!
//! Turns design requests into OpenSCAD sources and preview images.

use anyhow::Result;
use textcad_server::{api, config::ServerConfig, engine};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing()?;

    // Load configuration
    let config = ServerConfig::load()?;
    info!(
        host = %config.host,
        port = config.port,
        primary = %config.primary_provider,
        configured = ?config.configured_providers(),
        "Loaded configuration"
    );

    let state = engine::init_state(&config)?;
    let app = api::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("  Health check: http://{}/health", addr);
    info!("  Generate: POST http://{}/submit", addr);
    info!("  Download: http://{}/download/<filename>", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "textcad_server=info,textcad_llm=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

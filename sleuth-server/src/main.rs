//! Sleuth Server - REST API for fraud forensics
//!
//! Configuration comes from the environment; see [`Config::from_env`] and
//! [`sleuth_core::EngineConfig::from_env`].

use std::net::SocketAddr;

use sleuth_server::{create_router_with_state, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sleuth_server=info,sleuth_core=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;

    let stats = state.engine().stats();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = ?config.engine.data_dir,
        texts = stats.indexed_texts,
        hashes = stats.indexed_hashes,
        provider = %stats.embedding_provider,
        "Starting Sleuth server"
    );
    if config.engine.data_dir.is_none() {
        tracing::warn!("SLEUTH_DATA_DIR not set, submissions are kept in memory only");
    }

    let app = create_router_with_state(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening (Swagger UI at /docs)");

    // Peer addresses are needed by the rate limiter's key extractor
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

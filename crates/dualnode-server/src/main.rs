//! # dualnode-server
//!
//! Coordinator binary for the dualnode field-station system.
//!
//! This binary provides:
//! - REST API for station registration, telemetry, and code dispatch
//! - WebSocket event stream for live viewers
//! - Periodic presence sweep marking silent stations offline
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package dualnode-server
//!
//! # Production
//! DUALNODE_ENV=production ./dualnode-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::sync::Arc;

use dualnode_core::{Config, PresenceMonitor};
use tokio::net::TcpListener;
use tracing::info;

use dualnode_server::{api, logging, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("DUALNODE_ENV").is_ok_and(|v| v == "production");
    logging::init(is_production)?;

    info!("Starting dualnode coordinator");

    let config_path = std::env::var("DUALNODE_CONFIG")
        .map_or_else(|_| Config::default_path(), std::path::PathBuf::from);
    let config = Config::load_or_default(&config_path)?;
    info!(path = %config_path.display(), max_stations = config.registry.max_stations, "configuration loaded");

    let state = AppState::new(config.clone())?;

    // Presence sweep runs for the life of the process.
    let monitor = PresenceMonitor::new(Arc::clone(&state.registry), &config.registry);
    tokio::spawn(monitor.run());

    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Coordinator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

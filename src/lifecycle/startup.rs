//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize all subsystems in dependency order
//! - Start background tasks (config watcher, signals, metrics)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, ConfigError};
use crate::http::EdgeServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Entrypoints, ListenerError};
use crate::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Run the proxy from a configuration file until shutdown.
pub async fn run(config_path: &Path) -> Result<(), StartupError> {
    let config = load_config(config_path)?;
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        routes = config.routes.len(),
        pools = config.pools.len(),
        "edge-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address, metrics disabled"
            ),
        }
    }

    let server = EdgeServer::new(config.clone())?;
    let entrypoints = Entrypoints::bind(&config).await?;

    let (update_tx, update_rx) = mpsc::unbounded_channel();
    // Kept alive for the lifetime of the server.
    let _watcher = match ConfigWatcher::with_sender(config_path, update_tx.clone()).run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Config file watching unavailable, reload with SIGHUP");
            None
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::listen(shutdown, config_path.to_path_buf(), update_tx));

    server.run(entrypoints, update_rx, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

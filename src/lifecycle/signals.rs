//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//! - Trigger appropriate actions (shutdown, reload)
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second SIGTERM/SIGINT during drain forces exit
//! - SIGHUP triggers config reload, not shutdown

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::config::watcher::reload_into;
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;

/// Exit code used when a second signal cuts the drain short.
const FORCED_EXIT_CODE: i32 = 130;

/// Handle signals until the process exits.
pub async fn listen(
    shutdown: Shutdown,
    config_path: PathBuf,
    reload_tx: mpsc::UnboundedSender<ProxyConfig>,
) {
    wait_for_termination(&config_path, &reload_tx).await;
    tracing::info!("Termination signal received, starting graceful shutdown");
    shutdown.trigger();

    wait_for_termination(&config_path, &reload_tx).await;
    tracing::warn!("Second termination signal received, forcing exit");
    std::process::exit(FORCED_EXIT_CODE);
}

#[cfg(unix)]
async fn wait_for_termination(config_path: &Path, reload_tx: &mpsc::UnboundedSender<ProxyConfig>) {
    use tokio::signal::unix::{signal, SignalKind};

    let signals = (signal(SignalKind::terminate()), signal(SignalKind::hangup()));
    let (mut terminate, mut hangup) = match signals {
        (Ok(terminate), Ok(hangup)) => (terminate, hangup),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(
                error = %e,
                "Failed to install signal handlers, only Ctrl+C is handled"
            );
            ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = ctrl_c() => return,
            _ = terminate.recv() => return,
            _ = hangup.recv() => {
                tracing::info!(path = ?config_path, "SIGHUP received, reloading configuration");
                reload_into(config_path, reload_tx);
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination(
    _config_path: &Path,
    _reload_tx: &mpsc::UnboundedSender<ProxyConfig>,
) {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

//! Probe execution.
//!
//! One probe answers "is this instance ready right now?". The result feeds
//! the state machine; a failed probe is logged and never propagated.

use std::process::Stdio;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time;

use crate::config::{HealthCheckConfig, ProbeConfig};

const USER_AGENT: &str = concat!("edge-proxy-health-check/", env!("CARGO_PKG_VERSION"));

/// Why a probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("non-success status {0}")]
    Status(StatusCode),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("command exited with {0}")]
    Command(std::process::ExitStatus),

    #[error("failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("invalid probe: {0}")]
    Invalid(String),
}

/// Executes the probe configured for a pool.
#[derive(Clone)]
pub struct Prober {
    client: Client<HttpConnector, Body>,
    probe: ProbeConfig,
    timeout: Duration,
}

impl Prober {
    pub fn new(client: Client<HttpConnector, Body>, config: &HealthCheckConfig) -> Self {
        Self {
            client,
            probe: config.probe.clone(),
            timeout: config.timeout(),
        }
    }

    /// Probe `address`, bounded by the configured timeout.
    pub async fn check(&self, address: &str) -> Result<(), ProbeError> {
        match time::timeout(self.timeout, self.run(address)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }

    async fn run(&self, address: &str) -> Result<(), ProbeError> {
        match &self.probe {
            ProbeConfig::Http { path } => {
                let request = Request::builder()
                    .method("GET")
                    .uri(format!("http://{address}{path}"))
                    .header(header::USER_AGENT, USER_AGENT)
                    .body(Body::empty())
                    .map_err(|e| ProbeError::Invalid(e.to_string()))?;

                let response = self
                    .client
                    .request(request)
                    .await
                    .map_err(|e| ProbeError::Connect(e.to_string()))?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(ProbeError::Status(response.status()))
                }
            }
            ProbeConfig::Tcp => TcpStream::connect(address)
                .await
                .map(drop)
                .map_err(|e| ProbeError::Connect(e.to_string())),
            ProbeConfig::Command { argv } => {
                let args: Vec<String> = argv
                    .iter()
                    .map(|a| a.replace("{address}", address))
                    .collect();
                let (program, rest) = args
                    .split_first()
                    .ok_or_else(|| ProbeError::Invalid("empty argv".to_string()))?;
                let status = Command::new(program)
                    .args(rest)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .status()
                    .await?;
                if status.success() {
                    Ok(())
                } else {
                    Err(ProbeError::Command(status))
                }
            }
        }
    }
}

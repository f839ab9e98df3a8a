//! Entrypoint binding.
//!
//! # Responsibilities
//! - Bind every configured entrypoint before any traffic is served
//! - Load TLS material for the `https` entrypoint
//! - Report bind failures as fatal startup errors

use std::net::{SocketAddr, TcpListener};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

use crate::config::ProxyConfig;
use crate::net::tls::load_tls_config;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Failed to load certificate or key.
    #[error("Failed to load TLS material: {0}")]
    Tls(std::io::Error),
    /// An entrypoint stopped serving.
    #[error("Entrypoint failed: {0}")]
    Serve(std::io::Error),
}

/// The bound sockets of every entrypoint.
#[derive(Debug)]
pub struct Entrypoints {
    pub http: TcpListener,
    pub https: Option<(TcpListener, RustlsConfig)>,
    pub admin: Option<TcpListener>,
}

impl Entrypoints {
    /// Bind the public entrypoints, and the management entrypoint if enabled.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, ListenerError> {
        let http = bind(&config.listener.bind_address)?;

        let https = match &config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls.cert_path.as_ref(), tls.key_path.as_ref())
                    .await
                    .map_err(ListenerError::Tls)?;
                Some((bind(&tls.bind_address)?, rustls))
            }
            None => None,
        };

        let admin = if config.admin.enabled {
            Some(bind(&config.admin.bind_address)?)
        } else {
            None
        };

        Ok(Self { http, https, admin })
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http.local_addr().ok()
    }

    pub fn https_addr(&self) -> Option<SocketAddr> {
        self.https.as_ref().and_then(|(l, _)| l.local_addr().ok())
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin.as_ref().and_then(|l| l.local_addr().ok())
    }
}

fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let to_error = |source| ListenerError::Bind {
        address: address.to_string(),
        source,
    };
    let listener = TcpListener::bind(address).map_err(to_error)?;
    listener.set_nonblocking(true).map_err(to_error)?;

    tracing::info!(
        address = %listener.local_addr().map_err(to_error)?,
        "Listener bound"
    );
    Ok(listener)
}

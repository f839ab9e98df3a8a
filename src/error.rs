//! Error taxonomy for the request path and the registry.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while routing a request or changing the registry.
///
/// Request-path variants are converted into HTTP responses by the edge
/// listener (see `http::response`); none of them is fatal to the process.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no route matches host {host:?} and path {path:?}")]
    NoRouteFound { host: String, path: String },

    #[error("no healthy instance available in pool {pool:?}")]
    NoHealthyInstance { pool: String },

    #[error("upstream {instance} did not respond within {timeout:?}")]
    UpstreamTimeout { instance: String, timeout: Duration },

    #[error("upstream {instance} request failed: {reason}")]
    Upstream { instance: String, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),
}

impl ProxyError {
    /// HTTP status the edge listener answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NoRouteFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::NoHealthyInstance { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::ConfigInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, sent in the `X-Proxy-Error` header.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::NoRouteFound { .. } => "NO_ROUTE_FOUND",
            ProxyError::NoHealthyInstance { .. } => "NO_HEALTHY_INSTANCE",
            ProxyError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            ProxyError::Upstream { .. } => "UPSTREAM_ERROR",
            ProxyError::ConfigInvalid(_) => "CONFIG_INVALID",
        }
    }
}

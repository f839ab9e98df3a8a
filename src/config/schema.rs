//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the edge proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Public entrypoints (plain HTTP and optional TLS).
    pub listener: ListenerConfig,

    /// Management entrypoint.
    pub admin: AdminConfig,

    /// Route rules, in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Backend pools referenced by routes.
    pub pools: Vec<PoolConfig>,

    /// Upstream timeouts.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration for the public entrypoints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address of the `http` entrypoint (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional `https` entrypoint.
    pub tls: Option<TlsConfig>,

    /// Maximum request body accepted from clients, in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_body_size: 16 * 1024 * 1024,
        }
    }
}

/// TLS configuration for the `https` entrypoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsConfig {
    /// Bind address of the TLS entrypoint (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Which public entrypoint a route is served on.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Entrypoint {
    #[default]
    Http,
    Https,
}

impl Entrypoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entrypoint::Http => "http",
            Entrypoint::Https => "https",
        }
    }
}

impl std::fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route configuration mapping requests to a pool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host patterns: exact (`example.com`) or leading wildcard (`*.example.com`).
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Path prefixes.
    #[serde(default)]
    pub path_prefixes: Vec<String>,

    /// Entrypoint this route is attached to.
    #[serde(default)]
    pub entrypoint: Entrypoint,

    /// Pool to forward to.
    pub pool: String,
}

/// Load balancing policy of a pool.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalancerPolicy {
    #[default]
    RoundRobin,
    LeastConnections,
}

/// Backend pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PoolConfig {
    /// Unique pool identifier.
    pub id: String,

    /// Instance addresses (`host:port`), in order.
    #[serde(default)]
    pub instances: Vec<String>,

    #[serde(default)]
    pub balancer: BalancerPolicy,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Pools that must have a healthy instance before this pool admits traffic.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// How an instance is probed.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeConfig {
    /// `GET http://<address><path>`, healthy on 2xx.
    Http {
        #[serde(default = "default_probe_path")]
        path: String,
    },
    /// Healthy when a TCP connection can be opened.
    Tcp,
    /// Healthy when the command exits with status 0.
    /// `{address}` in any argument is replaced by the instance address.
    Command { argv: Vec<String> },
}

fn default_probe_path() -> String {
    "/health".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::Http {
            path: default_probe_path(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks. When disabled, instances are admitted immediately.
    pub enabled: bool,

    pub probe: ProbeConfig,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Number of consecutive failures before marking unhealthy.
    #[serde(alias = "retries")]
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe: ProbeConfig::default(),
            interval_secs: 10,
            timeout_secs: 5,
            unhealthy_threshold: 5,
            healthy_threshold: 1,
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Timeout configuration for upstream traffic.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for an upstream to return response headers, and the
    /// longest gap allowed between two body chunks after that, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Management entrypoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the management entrypoint.
    pub enabled: bool,

    /// Management entrypoint bind address.
    pub bind_address: String,

    /// Serve without authentication. Development only.
    pub insecure: bool,

    /// API key for authentication (Bearer token). Required unless `insecure`.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
            insecure: false,
            api_key: None,
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight requests may drain before connections are force-closed.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 30 }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

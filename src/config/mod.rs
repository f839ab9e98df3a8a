//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → compiled into a RoutingTable by the registry
//!
//! On reload signal (file change or SIGHUP):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → registry compiles and atomically swaps the RoutingTable
//!     → in-flight requests finish on the table they loaded
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BalancerPolicy, Entrypoint, HealthCheckConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, PoolConfig, ProbeConfig, ProxyConfig, RouteConfig, ShutdownConfig,
    TimeoutConfig, TlsConfig,
};
pub use validation::ValidationError;

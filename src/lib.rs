//! Edge proxy library: routing table, health checks, load balancing and the
//! edge listener.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::{EdgeServer, ProxyContext};
pub use lifecycle::Shutdown;
pub use net::Entrypoints;
pub use registry::Registry;

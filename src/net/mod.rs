//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (bind http, https, admin entrypoints; fail fast)
//!     → tls.rs (load certificate and key for https)
//!     → Hand sockets to the HTTP layer (axum-server)
//! ```
//!
//! # Design Decisions
//! - All sockets bound before traffic is served; bind failure is fatal
//! - TLS is optional and handled transparently by axum-server

pub mod listener;
pub mod tls;

pub use listener::{Entrypoints, ListenerError};

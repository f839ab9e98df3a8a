//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (one listener per entrypoint)
//!     → server.rs (Axum setup, request ID, body limit)
//!     → request.rs (host, request ID)
//!     → registry snapshot: route resolved, instance selected
//!     → request.rs + headers.rs (rewrite URI, strip hop-by-hop, X-Forwarded-*)
//!     → hyper client to instance
//!     → response.rs (strip hop-by-hop, or map ProxyError to a status)
//!     → Send to client
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{edge_router, EdgeServer, ProxyContext};

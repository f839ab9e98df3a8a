//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (entrypoint, host, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate compiled rules, rank by specificity)
//!     → Return: matched route or NoRouteFound
//!
//! Route Compilation (at load and on every reload):
//!     RouteConfig[]
//!     → Compile host patterns and prefixes into Rule variants
//!     → Freeze as immutable Router inside the RoutingTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Most specific match wins: longest path prefix, then host, then declaration order

pub mod matcher;
pub mod router;

pub use router::{CompiledRoute, Router};

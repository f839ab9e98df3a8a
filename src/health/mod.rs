//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Registry publishes table version
//!     → active.rs reconciles: one probe task per instance
//!     → probe.rs runs the pool's probe (http / tcp / command), bounded by timeout
//!     → state.rs decides the transition
//!     → instance health updated, balancer sees it on the next selection
//! ```
//!
//! # Design Decisions
//! - Only the monitor mutates instance health
//! - State transitions require consecutive successes/failures
//! - Health state is per-instance, not per-pool
//! - A failing or slow instance never stalls the probes of another

pub mod active;
pub mod probe;
pub mod state;

pub use active::HealthMonitor;
pub use state::HealthState;

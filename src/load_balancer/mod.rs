//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → pool identified
//!     → pool.rs (filter healthy instances, check dependencies)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through instances)
//!         - least_conn.rs (pick instance with fewest in-flight requests)
//!     → instance.rs (request guard tracks in-flight count)
//!     → Return instance or NoHealthyInstance
//! ```
//!
//! # Design Decisions
//! - Balancer state is scoped to one pool and survives reloads
//! - Unhealthy and not-yet-probed instances excluded from selection
//! - Selection is lock-free (atomics only)

pub mod instance;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

use std::sync::Arc;

pub use instance::{Instance, RequestGuard};
pub use pool::Pool;

/// Strategy picking one instance among healthy candidates.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick an instance. `candidates` contains only healthy instances.
    fn next_instance(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>>;

    /// Policy name for logs and the management API.
    fn name(&self) -> &'static str;
}

//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{instance::Instance, LoadBalancer};

/// Least connections selector.
/// Selects the instance with the minimum number of in-flight requests.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_instance(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        // In case of tie, the first one is selected (stability)
        candidates
            .iter()
            .min_by_key(|i| i.active_requests())
            .cloned()
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}

//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered instances of one pool
//! - Apply the pool's load balancing algorithm to healthy instances
//! - Carry instance health and balancer state across routing generations

use std::sync::Arc;

use crate::config::{BalancerPolicy, HealthCheckConfig, PoolConfig};
use crate::error::ProxyError;
use crate::health::state::HealthState;
use crate::load_balancer::{
    instance::Instance, least_conn::LeastConnections, round_robin::RoundRobin, LoadBalancer,
};

/// A named group of interchangeable instances.
#[derive(Debug, Clone)]
pub struct Pool {
    id: String,
    instances: Vec<Arc<Instance>>,
    policy: BalancerPolicy,
    balancer: Arc<dyn LoadBalancer>,
    health_check: HealthCheckConfig,
    depends_on: Vec<String>,
}

impl Pool {
    /// Create a pool with fresh instances.
    pub fn new(config: &PoolConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a pool, reusing instance records and balancer state from the
    /// previous generation of the same pool where they still apply.
    pub fn build(config: &PoolConfig, previous: Option<&Pool>) -> Self {
        let balancer = previous
            .filter(|p| p.policy == config.balancer)
            .map(|p| Arc::clone(&p.balancer))
            .unwrap_or_else(|| make_balancer(config.balancer));

        let health_enabled = config.health_check.enabled;
        let instances = config
            .instances
            .iter()
            .map(|address| {
                let existing = previous.and_then(|p| p.find(address));
                admit(address, health_enabled, existing)
            })
            .collect();

        Self {
            id: config.id.clone(),
            instances,
            policy: config.balancer,
            balancer,
            health_check: config.health_check.clone(),
            depends_on: config.depends_on.clone(),
        }
    }

    /// The same pool with a different instance list.
    pub(crate) fn with_instances(&self, instances: Vec<Arc<Instance>>) -> Self {
        Self {
            instances,
            ..self.clone()
        }
    }

    /// Create the record for a newly registered address.
    pub(crate) fn new_instance(&self, address: &str) -> Arc<Instance> {
        admit(address, self.health_check.enabled, None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    pub fn policy(&self) -> BalancerPolicy {
        self.policy
    }

    pub fn balancer_name(&self) -> &'static str {
        self.balancer.name()
    }

    pub fn health_check(&self) -> &HealthCheckConfig {
        &self.health_check
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn find(&self, address: &str) -> Option<Arc<Instance>> {
        self.instances
            .iter()
            .find(|i| i.address() == address)
            .cloned()
    }

    pub fn healthy_instances(&self) -> Vec<Arc<Instance>> {
        self.instances
            .iter()
            .filter(|i| i.is_healthy())
            .cloned()
            .collect()
    }

    pub fn has_healthy(&self) -> bool {
        self.instances.iter().any(|i| i.is_healthy())
    }

    /// Select a healthy instance.
    pub fn select(&self) -> Result<Arc<Instance>, ProxyError> {
        let candidates = self.healthy_instances();
        match self.balancer.next_instance(&candidates) {
            Some(instance) => Ok(instance),
            None => {
                tracing::debug!(
                    pool = %self.id,
                    instance_count = self.instances.len(),
                    "No healthy instances found in pool"
                );
                for i in &self.instances {
                    tracing::trace!(address = %i.address(), state = %i.health(), "Instance status");
                }
                Err(ProxyError::NoHealthyInstance {
                    pool: self.id.clone(),
                })
            }
        }
    }
}

fn make_balancer(policy: BalancerPolicy) -> Arc<dyn LoadBalancer> {
    match policy {
        BalancerPolicy::RoundRobin => Arc::new(RoundRobin::new()),
        BalancerPolicy::LeastConnections => Arc::new(LeastConnections::new()),
    }
}

/// Instances of a pool without health checks are admitted immediately; the
/// others wait in `Unknown` for their first successful probe.
fn admit(address: &str, health_enabled: bool, existing: Option<Arc<Instance>>) -> Arc<Instance> {
    match existing {
        Some(instance) if health_enabled || instance.is_healthy() => instance,
        _ if health_enabled => Arc::new(Instance::new(address)),
        _ => Arc::new(Instance::with_state(address, HealthState::Healthy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::HealthPolicy;

    fn config(id: &str, instances: &[&str], health: bool) -> PoolConfig {
        PoolConfig {
            id: id.into(),
            instances: instances.iter().map(|s| s.to_string()).collect(),
            balancer: BalancerPolicy::RoundRobin,
            health_check: HealthCheckConfig {
                enabled: health,
                ..Default::default()
            },
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn test_unhealthy_instance_never_selected() {
        let pool = Pool::new(&config("A", &["i1:80", "i2:80"], true));
        let policy = HealthPolicy::default();
        pool.instances()[0].record_probe(true, &policy);
        for _ in 0..5 {
            pool.instances()[1].record_probe(false, &policy);
        }
        assert_eq!(pool.instances()[1].health(), HealthState::Unhealthy);

        for _ in 0..10 {
            assert_eq!(pool.select().unwrap().address(), "i1:80");
        }

        pool.instances()[1].record_probe(true, &policy);
        let picks: Vec<_> = (0..2).map(|_| pool.select().unwrap().address().to_string()).collect();
        assert!(picks.contains(&"i2:80".to_string()));
    }

    #[test]
    fn test_fifth_failure_excludes_on_next_call() {
        let pool = Pool::new(&config("A", &["i1:80"], true));
        let policy = HealthPolicy::default();
        pool.instances()[0].record_probe(true, &policy);
        for _ in 0..4 {
            pool.instances()[0].record_probe(false, &policy);
        }
        assert!(pool.select().is_ok());

        pool.instances()[0].record_probe(false, &policy);
        assert!(matches!(pool.select(), Err(ProxyError::NoHealthyInstance { .. })));
    }

    #[test]
    fn test_unprobed_pool_is_unavailable() {
        let pool = Pool::new(&config("A", &["i1:80"], true));
        assert!(matches!(
            pool.select(),
            Err(ProxyError::NoHealthyInstance { ref pool }) if pool == "A"
        ));
    }

    #[test]
    fn test_health_disabled_admits_immediately() {
        let pool = Pool::new(&config("A", &["i1:80", "i2:80"], false));
        assert_eq!(pool.healthy_instances().len(), 2);
    }

    #[test]
    fn test_rebuild_keeps_instance_records() {
        let first = Pool::new(&config("A", &["i1:80", "i2:80"], true));
        first.instances()[0].record_probe(true, &HealthPolicy::default());

        let second = Pool::build(&config("A", &["i1:80", "i3:80"], true), Some(&first));
        assert!(Arc::ptr_eq(&first.instances()[0], &second.instances()[0]));
        assert!(second.instances()[0].is_healthy());
        assert_eq!(second.instances()[1].health(), HealthState::Unknown);
        assert!(Arc::ptr_eq(&first.balancer, &second.balancer));
    }
}

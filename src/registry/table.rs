//! The compiled routing snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ConfigError, Entrypoint, ProxyConfig};
use crate::error::ProxyError;
use crate::load_balancer::{Instance, Pool};
use crate::routing::{CompiledRoute, Router};

/// An immutable, queryable snapshot of every route and pool.
///
/// Built whole and published with an atomic swap; a request that loaded a
/// table keeps using it even if a newer one is installed mid-flight.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    version: u64,
    router: Arc<Router>,
    /// Pools in declaration order.
    pools: Vec<Arc<Pool>>,
    index: HashMap<String, usize>,
}

impl RoutingTable {
    /// Compile a validated configuration.
    ///
    /// Pools that also exist in `previous` keep their instance records and
    /// balancer state.
    pub fn compile(
        config: &ProxyConfig,
        version: u64,
        previous: Option<&RoutingTable>,
    ) -> Result<Self, ConfigError> {
        let router = Router::from_config(&config.routes)?;
        let pools = config
            .pools
            .iter()
            .map(|pool_config| {
                let prior = previous.and_then(|t| t.pool(&pool_config.id));
                Arc::new(Pool::build(pool_config, prior.map(Arc::as_ref)))
            })
            .collect();
        Ok(Self::assemble(version, Arc::new(router), pools))
    }

    fn assemble(version: u64, router: Arc<Router>, pools: Vec<Arc<Pool>>) -> Self {
        let index = pools
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id().to_string(), i))
            .collect();
        Self {
            version,
            router,
            pools,
            index,
        }
    }

    /// The same routes with one pool replaced.
    pub(crate) fn with_pool(&self, version: u64, pool: Pool) -> Self {
        let mut pools = self.pools.clone();
        if let Some(&i) = self.index.get(pool.id()) {
            pools[i] = Arc::new(pool);
        }
        Self::assemble(version, Arc::clone(&self.router), pools)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        self.router.routes()
    }

    pub fn pools(&self) -> &[Arc<Pool>] {
        &self.pools
    }

    pub fn pool(&self, id: &str) -> Option<&Arc<Pool>> {
        self.index.get(id).map(|&i| &self.pools[i])
    }

    /// Resolve a request to a route.
    pub fn resolve(
        &self,
        entrypoint: Entrypoint,
        host: &str,
        path: &str,
    ) -> Result<&CompiledRoute, ProxyError> {
        self.router.resolve(entrypoint, host, path)
    }

    /// True when the pool has a healthy instance and so do the pools it depends on.
    pub fn is_available(&self, pool_id: &str) -> bool {
        let Some(pool) = self.pool(pool_id) else {
            return false;
        };
        pool.has_healthy()
            && pool
                .depends_on()
                .iter()
                .all(|dep| self.pool(dep).is_some_and(|p| p.has_healthy()))
    }

    /// Pick an instance of `pool_id`.
    ///
    /// A pool whose dependencies have no healthy instance is treated as
    /// having none itself.
    pub fn select(&self, pool_id: &str) -> Result<Arc<Instance>, ProxyError> {
        let unavailable = || ProxyError::NoHealthyInstance {
            pool: pool_id.to_string(),
        };
        let pool = self.pool(pool_id).ok_or_else(unavailable)?;
        for dep in pool.depends_on() {
            if !self.pool(dep).is_some_and(|p| p.has_healthy()) {
                tracing::debug!(
                    pool = %pool_id,
                    dependency = %dep,
                    "Dependency has no healthy instance"
                );
                return Err(unavailable());
            }
        }
        pool.select()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HealthCheckConfig, PoolConfig, RouteConfig};
    use crate::health::state::HealthPolicy;

    fn config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.pools.push(PoolConfig {
            id: "db".into(),
            instances: vec!["db:5432".into()],
            balancer: Default::default(),
            health_check: HealthCheckConfig::default(),
            depends_on: vec![],
        });
        config.pools.push(PoolConfig {
            id: "server".into(),
            instances: vec!["server:8000".into()],
            balancer: Default::default(),
            health_check: HealthCheckConfig {
                enabled: false,
                ..Default::default()
            },
            depends_on: vec!["db".into()],
        });
        config.routes.push(RouteConfig {
            name: "app".into(),
            hosts: vec!["example.com".into()],
            path_prefixes: vec![],
            entrypoint: Entrypoint::Http,
            pool: "server".into(),
        });
        config
    }

    #[test]
    fn test_dependency_gates_selection() {
        let table = RoutingTable::compile(&config(), 1, None).unwrap();
        assert!(matches!(table.select("server"), Err(ProxyError::NoHealthyInstance { .. })));
        assert!(!table.is_available("server"));

        let db = &table.pool("db").unwrap().instances()[0];
        db.record_probe(true, &HealthPolicy::default());

        assert_eq!(table.select("server").unwrap().address(), "server:8000");
        assert!(table.is_available("server"));
    }

    #[test]
    fn test_unknown_pool_has_no_instance() {
        let table = RoutingTable::compile(&config(), 1, None).unwrap();
        assert!(matches!(table.select("ghost"), Err(ProxyError::NoHealthyInstance { .. })));
    }

    #[test]
    fn test_recompile_preserves_health() {
        let first = RoutingTable::compile(&config(), 1, None).unwrap();
        first.pool("db").unwrap().instances()[0].record_probe(true, &HealthPolicy::default());

        let second = RoutingTable::compile(&config(), 2, Some(&first)).unwrap();
        assert_eq!(second.version(), 2);
        assert!(second.pool("db").unwrap().instances()[0].is_healthy());
        assert_eq!(second.routes().len(), 1);
    }
}

//! Active health checking.
//!
//! # Responsibilities
//! - Run one periodic probe task per registered instance
//! - Start and stop tasks as the registry publishes new tables
//! - Update instance health state based on results

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::Prober;
use crate::health::state::HealthPolicy;
use crate::load_balancer::Instance;
use crate::observability::metrics;
use crate::registry::Registry;

/// A probe task is identified by the pool and the instance record it watches.
type ProbeKey = (String, usize);

struct ProbeTask {
    address: String,
    config: HealthCheckConfig,
    handle: JoinHandle<()>,
}

pub struct HealthMonitor {
    registry: Arc<Registry>,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self { registry, client }
    }

    /// Run until shutdown, reconciling probe tasks on every registry change.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut versions = self.registry.subscribe();
        let mut tasks: HashMap<ProbeKey, ProbeTask> = HashMap::new();

        tracing::info!("Health monitor starting");
        self.reconcile(&mut tasks);

        loop {
            tokio::select! {
                changed = versions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.reconcile(&mut tasks);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        for task in tasks.into_values() {
            task.handle.abort();
        }
    }

    /// Make the running tasks match the instances of the current table.
    fn reconcile(&self, tasks: &mut HashMap<ProbeKey, ProbeTask>) {
        let table = self.registry.snapshot();
        let mut live = HashMap::new();
        let mut registered = HashSet::new();

        for pool in table.pools() {
            for instance in pool.instances() {
                registered.insert((pool.id(), instance.address()));
            }
            if !pool.health_check().enabled {
                continue;
            }
            for instance in pool.instances() {
                let key = (pool.id().to_string(), Arc::as_ptr(instance) as usize);
                live.insert(key, (pool.health_check(), instance));
            }
        }

        tasks.retain(|key, task| {
            let keep = live
                .get(key)
                .is_some_and(|(config, _)| **config == task.config);
            if !keep {
                task.handle.abort();
                if !registered.contains(&(key.0.as_str(), task.address.as_str())) {
                    metrics::clear_instance_health(&key.0, &task.address);
                }
            }
            keep
        });

        for (key, (config, instance)) in live {
            if tasks.contains_key(&key) {
                continue;
            }
            let prober = Prober::new(self.client.clone(), config);
            let handle = tokio::spawn(probe_loop(
                key.0.clone(),
                Arc::clone(instance),
                config.clone(),
                prober,
            ));
            tasks.insert(
                key,
                ProbeTask {
                    address: instance.address().to_string(),
                    config: config.clone(),
                    handle,
                },
            );
        }

        tracing::debug!(
            version = table.version(),
            probes = tasks.len(),
            "Health probes reconciled"
        );
    }
}

/// Probe one instance forever. Aborted when the instance leaves the table.
async fn probe_loop(
    pool: String,
    instance: Arc<Instance>,
    config: HealthCheckConfig,
    prober: Prober,
) {
    let policy = HealthPolicy::from(&config);
    let mut ticker = time::interval(config.interval());
    // A slow probe delays the next one instead of bunching them up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let address = instance.address();
        let healthy = match prober.check(address).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(pool = %pool, address = %address, error = %e, "Health check failed");
                false
            }
        };

        if let Some(transition) = instance.record_probe(healthy, &policy) {
            tracing::info!(
                pool = %pool,
                address = %address,
                from = %transition.from,
                to = %transition.to,
                "Instance health changed"
            );
        }

        metrics::record_instance_health(&pool, address, instance.health());
    }
}

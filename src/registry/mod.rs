//! Backend registry.
//!
//! # Data Flow
//! ```text
//! load / reload(config) ─┐
//! register(pool, addr) ──┼─→ build next RoutingTable (writers serialized)
//! deregister(pool, addr)─┘      → ArcSwap::store (atomic publish)
//!                               → watch channel: new version
//!
//! snapshot() → Arc<RoutingTable>   (lock-free read, never torn)
//! ```
//!
//! # Design Decisions
//! - Readers never lock; they hold an Arc to a complete table
//! - Writers rebuild the table instead of mutating it in place
//! - A failed reload leaves the previous table serving

pub mod table;

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::config::validation::{is_valid_address, validate_config};
use crate::config::{ConfigError, ProxyConfig, ValidationError};
use crate::error::ProxyError;
use crate::load_balancer::Instance;

pub use table::RoutingTable;

/// Owner of the live routing table.
pub struct Registry {
    table: ArcSwap<RoutingTable>,
    write_lock: Mutex<()>,
    version_tx: watch::Sender<u64>,
}

impl Registry {
    /// Validate and compile the initial table (version 1).
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let table = RoutingTable::compile(config, 1, None)?;
        let (version_tx, _) = watch::channel(table.version());
        Ok(Self {
            table: ArcSwap::from_pointee(table),
            write_lock: Mutex::new(()),
            version_tx,
        })
    }

    /// The current table. Cheap; never blocks on writers.
    pub fn snapshot(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    pub fn version(&self) -> u64 {
        self.table.load().version()
    }

    /// Notified with the new version after every publish.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Replace all routes and pools. On error nothing changes.
    pub fn reload(&self, config: &ProxyConfig) -> Result<u64, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let _guard = self.lock_writers();
        let current = self.table.load_full();
        let next = RoutingTable::compile(config, current.version() + 1, Some(&current))?;
        Ok(self.publish(next))
    }

    /// Add an instance to a pool. Registering an address that is already
    /// present returns the existing record unchanged.
    pub fn register(&self, pool_id: &str, address: &str) -> Result<Arc<Instance>, ProxyError> {
        if !is_valid_address(address) {
            return Err(ConfigError::from(ValidationError::InvalidAddress {
                pool: pool_id.to_string(),
                address: address.to_string(),
            })
            .into());
        }

        let _guard = self.lock_writers();
        let current = self.table.load_full();
        let pool = current.pool(pool_id).ok_or_else(|| no_such_pool(pool_id))?;

        if let Some(existing) = pool.find(address) {
            tracing::debug!(pool = %pool_id, address = %address, "Instance already registered");
            return Ok(existing);
        }

        let instance = pool.new_instance(address);
        let mut instances = pool.instances().to_vec();
        instances.push(Arc::clone(&instance));
        let next = current.with_pool(current.version() + 1, pool.with_instances(instances));
        let version = self.publish(next);

        tracing::info!(pool = %pool_id, address = %address, version, "Instance registered");
        Ok(instance)
    }

    /// Remove an instance from a pool. Returns whether it was present.
    pub fn deregister(&self, pool_id: &str, address: &str) -> Result<bool, ProxyError> {
        let _guard = self.lock_writers();
        let current = self.table.load_full();
        let pool = current.pool(pool_id).ok_or_else(|| no_such_pool(pool_id))?;

        let instances: Vec<_> = pool
            .instances()
            .iter()
            .filter(|i| i.address() != address)
            .cloned()
            .collect();
        if instances.len() == pool.instances().len() {
            return Ok(false);
        }

        let next = current.with_pool(current.version() + 1, pool.with_instances(instances));
        let version = self.publish(next);

        tracing::info!(pool = %pool_id, address = %address, version, "Instance deregistered");
        Ok(true)
    }

    fn publish(&self, table: RoutingTable) -> u64 {
        let version = table.version();
        self.table.store(Arc::new(table));
        self.version_tx.send_replace(version);
        version
    }

    fn lock_writers(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn no_such_pool(pool_id: &str) -> ProxyError {
    ConfigError::from(ValidationError::NoSuchPool {
        pool: pool_id.to_string(),
    })
    .into()
}

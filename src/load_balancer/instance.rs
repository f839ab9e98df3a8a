//! Backend instance abstraction.
//!
//! # Responsibilities
//! - Represent a single backend instance of a pool
//! - Track health state and the consecutive probe counters behind it
//! - Track in-flight requests (for Least Connections LB)

use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::health::state::{HealthPolicy, HealthState, Transition};

/// A single backend instance.
#[derive(Debug)]
pub struct Instance {
    /// The `host:port` address of the instance.
    address: String,
    /// Current health state (see [`HealthState`]).
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    /// Unix time of the last probe in milliseconds; 0 = never probed.
    last_check_ms: AtomicU64,
    /// Number of requests currently being proxied to this instance.
    active_requests: AtomicUsize,
}

impl Instance {
    /// Create an instance that waits for its first successful probe.
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_state(address, HealthState::Unknown)
    }

    /// Create an instance in an explicit initial state.
    pub fn with_state(address: impl Into<String>, state: HealthState) -> Self {
        Self {
            address: address.into(),
            state: AtomicU8::new(state as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            last_check_ms: AtomicU64::new(0),
            active_requests: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Only healthy instances receive traffic; unknown ones are still waiting
    /// on their readiness probe.
    pub fn is_healthy(&self) -> bool {
        self.health() == HealthState::Healthy
    }

    /// Time of the most recent probe, if any.
    pub fn last_check(&self) -> Option<SystemTime> {
        match self.last_check_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Count a request against this instance until the guard drops.
    pub fn track_request(self: &Arc<Self>) -> RequestGuard {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
        RequestGuard {
            instance: Arc::clone(self),
        }
    }

    // --- Health Logic ---

    /// Feed one probe result into the state machine.
    ///
    /// Called only by the instance's probe task, so the read-modify-write on
    /// the counters never races with another writer.
    pub(crate) fn record_probe(&self, success: bool, policy: &HealthPolicy) -> Option<Transition> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1);
        self.last_check_ms.store(now_ms.max(1), Ordering::Relaxed);

        let (successes, failures) = if success {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            let s = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
            (s, 0)
        } else {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            let f = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            (0, f)
        };

        let from = self.health();
        let to = policy.next(from, successes, failures);
        if from == to {
            return None;
        }

        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.state.store(to as u8, Ordering::Release);
        Some(Transition { from, to })
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct RequestGuard {
    instance: Arc<Instance>,
}

impl Deref for RequestGuard {
    type Target = Instance;
    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.instance.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

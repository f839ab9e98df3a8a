//! Instance health state machine.
//!
//! # States
//! - Unknown: registered, not yet probed successfully; receives no traffic
//! - Healthy: instance receives traffic
//! - Unhealthy: instance excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Unknown   → Healthy:   consecutive successes >= healthy_threshold
//! Unknown   → Unhealthy: consecutive failures  >= unhealthy_threshold
//! Healthy   → Unhealthy: consecutive failures  >= unhealthy_threshold
//! Unhealthy → Healthy:   consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Counters reset on state transition
//! - Pure decision logic; the instance owns the counters

use serde::Serialize;

use crate::config::HealthCheckConfig;

/// Health of one instance.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        })
    }
}

/// Thresholds driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

impl From<&HealthCheckConfig> for HealthPolicy {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            healthy_threshold: config.healthy_threshold.max(1),
            unhealthy_threshold: config.unhealthy_threshold.max(1),
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthCheckConfig::default())
    }
}

/// A state change produced by a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
}

impl HealthPolicy {
    /// Decide the next state given the current state and the consecutive
    /// success/failure counts *including* the latest probe.
    pub fn next(&self, current: HealthState, successes: u32, failures: u32) -> HealthState {
        match current {
            HealthState::Healthy if failures >= self.unhealthy_threshold => HealthState::Unhealthy,
            HealthState::Unhealthy if successes >= self.healthy_threshold => HealthState::Healthy,
            HealthState::Unknown if successes >= self.healthy_threshold => HealthState::Healthy,
            HealthState::Unknown if failures >= self.unhealthy_threshold => HealthState::Unhealthy,
            state => state,
        }
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, pool
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_instance_health` (gauge): 1=healthy, 0=not healthy
//! - `proxy_config_reloads_total` (counter): reloads by outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording is a no-op until an exporter is installed

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::HealthState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, pool: &str, elapsed: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("pool", pool.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

pub fn record_instance_health(pool: &str, address: &str, state: HealthState) {
    let value = if state == HealthState::Healthy { 1.0 } else { 0.0 };
    gauge!(
        "proxy_instance_health",
        "pool" => pool.to_string(),
        "instance" => address.to_string()
    )
    .set(value);
}

/// Zero the health series of an instance that left its pool.
pub fn clear_instance_health(pool: &str, address: &str) {
    gauge!(
        "proxy_instance_health",
        "pool" => pool.to_string(),
        "instance" => address.to_string()
    )
    .set(0.0);
}

pub fn record_reload(success: bool) {
    let outcome = if success { "applied" } else { "rejected" };
    counter!("proxy_config_reloads_total", "outcome" => outcome).increment(1);
}

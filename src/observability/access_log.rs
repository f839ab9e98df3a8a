//! Access log.
//!
//! Exactly one record per proxied request, emitted under the `access_log`
//! target so it can be filtered or shipped separately from diagnostics.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{Method, StatusCode};
use serde::Serialize;

/// One access-log line.
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    /// Unix time the request was received, in milliseconds.
    pub timestamp_ms: u64,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub route: Option<String>,
    pub pool: Option<String>,
    pub instance: Option<String>,
    pub status: u16,
    pub duration_ms: f64,
}

impl AccessLogEntry {
    pub fn new(request_id: impl Into<String>, method: &Method, path: impl Into<String>) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            request_id: request_id.into(),
            method: method.to_string(),
            path: path.into(),
            route: None,
            pool: None,
            instance: None,
            status: 0,
            duration_ms: 0.0,
        }
    }

    pub fn finish(&mut self, status: StatusCode, elapsed: Duration) {
        self.status = status.as_u16();
        self.duration_ms = elapsed.as_secs_f64() * 1000.0;
    }

    pub fn emit(&self) {
        tracing::info!(
            target: "access_log",
            timestamp_ms = self.timestamp_ms,
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            route = self.route.as_deref().unwrap_or("-"),
            pool = self.pool.as_deref().unwrap_or("-"),
            instance = self.instance.as_deref().unwrap_or("-"),
            status = self.status,
            duration_ms = self.duration_ms,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_all_fields() {
        let mut entry = AccessLogEntry::new("req-1", &Method::GET, "/api/users");
        entry.route = Some("api".into());
        entry.pool = Some("B".into());
        entry.instance = Some("10.0.0.2:8000".into());
        entry.finish(StatusCode::OK, Duration::from_millis(12));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["method"], "GET");
        assert_eq!(json["pool"], "B");
        assert_eq!(json["instance"], "10.0.0.2:8000");
        assert_eq!(json["status"], 200);
        assert!(json["duration_ms"].as_f64().unwrap() >= 12.0);
        assert!(json["timestamp_ms"].as_u64().unwrap() > 0);
    }
}

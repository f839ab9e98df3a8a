//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing pools)
//! - Validate value ranges (thresholds > 0, probe spacing)
//! - Detect duplicate declarations and dependency cycles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::{Entrypoint, PoolConfig, ProbeConfig, ProxyConfig};
use crate::routing::matcher::HostPattern;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route {route:?} has neither hosts nor path prefixes")]
    EmptyRoute { route: String },

    #[error("route {route:?} is declared more than once")]
    DuplicateRoute { route: String },

    #[error("route {route:?} references unknown pool {pool:?}")]
    UnknownPool { route: String, pool: String },

    #[error("route {route:?} has invalid host pattern {pattern:?}")]
    InvalidHostPattern { route: String, pattern: String },

    #[error("route {route:?} has path prefix {prefix:?} that does not start with '/'")]
    InvalidPathPrefix { route: String, prefix: String },

    #[error("route {route:?} uses the https entrypoint but no TLS listener is configured")]
    HttpsWithoutTls { route: String },

    #[error("pool {pool:?} is declared more than once")]
    DuplicatePool { pool: String },

    #[error("pool {pool:?} has invalid instance address {address:?} (expected host:port)")]
    InvalidAddress { pool: String, address: String },

    #[error("pool {pool:?} lists instance {address:?} more than once")]
    DuplicateInstance { pool: String, address: String },

    #[error("pool {pool:?} health check: {reason}")]
    InvalidHealthCheck { pool: String, reason: String },

    #[error("pool {pool:?} depends on unknown pool {dependency:?}")]
    UnknownDependency { pool: String, dependency: String },

    #[error("pool {pool:?} is part of a dependency cycle")]
    DependencyCycle { pool: String },

    #[error("admin entrypoint requires an api_key unless insecure = true")]
    AdminWithoutKey,

    #[error("pool {pool:?} does not exist")]
    NoSuchPool { pool: String },

    #[error("timeouts.{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut pool_ids = HashSet::new();
    for pool in &config.pools {
        if !pool_ids.insert(pool.id.as_str()) {
            errors.push(ValidationError::DuplicatePool {
                pool: pool.id.clone(),
            });
        }
        validate_pool(pool, &mut errors);
    }

    for pool in &config.pools {
        for dependency in &pool.depends_on {
            if !pool_ids.contains(dependency.as_str()) {
                errors.push(ValidationError::UnknownDependency {
                    pool: pool.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }
    errors.extend(find_dependency_cycles(&config.pools));

    let mut route_names = HashSet::new();
    for route in &config.routes {
        if !route_names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute {
                route: route.name.clone(),
            });
        }
        if route.hosts.is_empty() && route.path_prefixes.is_empty() {
            errors.push(ValidationError::EmptyRoute {
                route: route.name.clone(),
            });
        }
        if !pool_ids.contains(route.pool.as_str()) {
            errors.push(ValidationError::UnknownPool {
                route: route.name.clone(),
                pool: route.pool.clone(),
            });
        }
        for pattern in &route.hosts {
            if HostPattern::parse(pattern).is_none() {
                errors.push(ValidationError::InvalidHostPattern {
                    route: route.name.clone(),
                    pattern: pattern.clone(),
                });
            }
        }
        for prefix in &route.path_prefixes {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::InvalidPathPrefix {
                    route: route.name.clone(),
                    prefix: prefix.clone(),
                });
            }
        }
        if route.entrypoint == Entrypoint::Https && config.listener.tls.is_none() {
            errors.push(ValidationError::HttpsWithoutTls {
                route: route.name.clone(),
            });
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "connect_secs",
        });
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "upstream_secs",
        });
    }

    if config.admin.enabled
        && !config.admin.insecure
        && config.admin.api_key.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::AdminWithoutKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_pool(pool: &PoolConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for address in &pool.instances {
        if !is_valid_address(address) {
            errors.push(ValidationError::InvalidAddress {
                pool: pool.id.clone(),
                address: address.clone(),
            });
        } else if !seen.insert(address.as_str()) {
            errors.push(ValidationError::DuplicateInstance {
                pool: pool.id.clone(),
                address: address.clone(),
            });
        }
    }

    let health = &pool.health_check;
    if !health.enabled {
        return;
    }
    let mut invalid = |reason: &str| {
        errors.push(ValidationError::InvalidHealthCheck {
            pool: pool.id.clone(),
            reason: reason.to_string(),
        })
    };
    if health.timeout_secs == 0 {
        invalid("timeout_secs must be greater than zero");
    }
    if health.interval_secs < health.timeout_secs {
        invalid("interval_secs must not be shorter than timeout_secs");
    }
    if health.healthy_threshold == 0 || health.unhealthy_threshold == 0 {
        invalid("thresholds must be greater than zero");
    }
    match &health.probe {
        ProbeConfig::Command { argv } if argv.is_empty() => invalid("command probe needs argv"),
        ProbeConfig::Http { path } if !path.starts_with('/') => {
            invalid("http probe path must start with '/'")
        }
        _ => {}
    }
}

/// True when `address` is a `host:port` usable as an HTTP authority.
pub fn is_valid_address(address: &str) -> bool {
    let Some((host, port)) = address.rsplit_once(':') else {
        return false;
    };
    if host.is_empty() || !matches!(port.parse::<u16>(), Ok(p) if p > 0) {
        return false;
    }
    address.parse::<Authority>().is_ok()
}

fn find_dependency_cycles(pools: &[PoolConfig]) -> Vec<ValidationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        graph: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        cyclic: &mut HashSet<&'a str>,
    ) {
        match marks.get(id) {
            Some(Mark::Done) => return,
            Some(Mark::Visiting) => {
                cyclic.insert(id);
                return;
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        for &dep in graph.get(id).into_iter().flatten() {
            visit(dep, graph, marks, cyclic);
        }
        marks.insert(id, Mark::Done);
    }

    let graph: HashMap<&str, Vec<&str>> = pools
        .iter()
        .map(|p| (p.id.as_str(), p.depends_on.iter().map(String::as_str).collect()))
        .collect();

    let mut marks = HashMap::new();
    let mut cyclic = HashSet::new();
    for pool in pools {
        visit(&pool.id, &graph, &mut marks, &mut cyclic);
    }

    // Report in declaration order for stable output.
    pools
        .iter()
        .filter(|p| cyclic.contains(p.id.as_str()))
        .map(|p| ValidationError::DependencyCycle { pool: p.id.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{HealthCheckConfig, RouteConfig};

    fn pool(id: &str, instances: &[&str]) -> PoolConfig {
        PoolConfig {
            id: id.into(),
            instances: instances.iter().map(|s| s.to_string()).collect(),
            balancer: Default::default(),
            health_check: HealthCheckConfig::default(),
            depends_on: Vec::new(),
        }
    }

    fn route(name: &str, hosts: &[&str], prefixes: &[&str], pool: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            hosts: hosts.iter().map(|s| s.to_string()).collect(),
            path_prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
            entrypoint: Entrypoint::Http,
            pool: pool.into(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let mut config = ProxyConfig::default();
        config.pools.push(pool("server", &["server:8000", "10.0.0.2:8000"]));
        config.routes.push(route("app", &["example.com"], &[], "server"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ProxyConfig::default();
        config.pools.push(pool("server", &["server", "server:8000", "server:8000"]));
        config.routes.push(route("empty", &[], &[], "server"));
        config.routes.push(route("dangling", &["a.com"], &[], "missing"));
        config.routes.push(route("dangling", &["*"], &["api"], "server"));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidAddress {
            pool: "server".into(),
            address: "server".into()
        }));
        assert!(errors.contains(&ValidationError::DuplicateInstance {
            pool: "server".into(),
            address: "server:8000".into()
        }));
        assert!(errors.contains(&ValidationError::EmptyRoute { route: "empty".into() }));
        assert!(errors.contains(&ValidationError::UnknownPool {
            route: "dangling".into(),
            pool: "missing".into()
        }));
        assert!(errors.contains(&ValidationError::DuplicateRoute { route: "dangling".into() }));
        assert!(errors.contains(&ValidationError::InvalidHostPattern {
            route: "dangling".into(),
            pattern: "*".into()
        }));
        assert!(errors.contains(&ValidationError::InvalidPathPrefix {
            route: "dangling".into(),
            prefix: "api".into()
        }));
    }

    #[test]
    fn test_probe_spacing_must_cover_timeout() {
        let mut config = ProxyConfig::default();
        let mut p = pool("server", &["server:8000"]);
        p.health_check.interval_secs = 2;
        p.health_check.timeout_secs = 5;
        config.pools.push(p);

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidHealthCheck { .. }));
    }

    #[test]
    fn test_zero_upstream_timeouts_rejected() {
        let mut config = ProxyConfig::default();
        config.timeouts.connect_secs = 0;
        config.timeouts.upstream_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroTimeout {
                    field: "connect_secs"
                },
                ValidationError::ZeroTimeout {
                    field: "upstream_secs"
                },
            ]
        );
    }

    #[test]
    fn test_dependency_cycle_detected() {
        let mut config = ProxyConfig::default();
        let mut a = pool("a", &["a:1"]);
        a.depends_on.push("b".into());
        let mut b = pool("b", &["b:1"]);
        b.depends_on.push("a".into());
        let mut c = pool("c", &["c:1"]);
        c.depends_on.push("ghost".into());
        config.pools.extend([a, b, c]);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DependencyCycle { pool: "a".into() }));
        assert!(errors.contains(&ValidationError::UnknownDependency {
            pool: "c".into(),
            dependency: "ghost".into()
        }));
    }

    #[test]
    fn test_secure_admin_needs_key() {
        let mut config = ProxyConfig::default();
        config.admin.enabled = true;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::AdminWithoutKey]));

        config.admin.insecure = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_address_forms() {
        assert!(is_valid_address("server:8000"));
        assert!(is_valid_address("127.0.0.1:80"));
        assert!(is_valid_address("[::1]:8080"));
        assert!(!is_valid_address("server"));
        assert!(!is_valid_address(":80"));
        assert!(!is_valid_address("server:0"));
        assert!(!is_valid_address("server:http"));
    }
}

//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the most specific matching route for a request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan with ranking (acceptable for typical route counts)
//! - Ties keep the first-declared route, so resolution is deterministic
//! - Explicit NoRouteFound rather than silent default

use serde::Serialize;

use crate::config::{Entrypoint, RouteConfig, ValidationError};
use crate::error::ProxyError;
use crate::routing::matcher::{normalize_host, Rule, Specificity};

/// A route compiled from configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledRoute {
    pub name: String,
    pub entrypoint: Entrypoint,
    pub hosts: Vec<String>,
    pub path_prefixes: Vec<String>,
    pub pool: String,
    #[serde(skip)]
    rule: Rule,
}

impl CompiledRoute {
    pub fn compile(config: &RouteConfig) -> Result<Self, ValidationError> {
        let rule = Rule::compile(&config.hosts, &config.path_prefixes).ok_or_else(|| {
            ValidationError::InvalidHostPattern {
                route: config.name.clone(),
                pattern: config.hosts.join(","),
            }
        })?;
        Ok(Self {
            name: config.name.clone(),
            entrypoint: config.entrypoint,
            hosts: config.hosts.clone(),
            path_prefixes: config.path_prefixes.clone(),
            pool: config.pool.clone(),
            rule,
        })
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }
}

/// The compiled set of routes for one routing generation.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Compile routes, preserving declaration order.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, ValidationError> {
        let routes = configs
            .iter()
            .map(CompiledRoute::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Resolve a request to exactly one route.
    ///
    /// `host` is the raw Host header value; it is normalized here.
    pub fn resolve(
        &self,
        entrypoint: Entrypoint,
        host: &str,
        path: &str,
    ) -> Result<&CompiledRoute, ProxyError> {
        let normalized = normalize_host(host);
        let mut best: Option<(Specificity, &CompiledRoute)> = None;

        for route in self.routes.iter().filter(|r| r.entrypoint == entrypoint) {
            let Some(specificity) = route.rule.evaluate(&normalized, path) else {
                continue;
            };
            // Strictly greater: an equally specific later route never displaces an earlier one.
            if best.map_or(true, |(current, _)| specificity > current) {
                best = Some((specificity, route));
            }
        }

        best.map(|(_, route)| route).ok_or_else(|| ProxyError::NoRouteFound {
            host: normalized,
            path: path.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_path_prefix_beats_host_only() {
        let router = Router::from_config(&[
            route("site", &["example.com"], &[], "A"),
            route("api", &[], &["/api"], "B"),
        ])
        .unwrap();

        let matched = router.resolve(Entrypoint::Http, "example.com", "/api").unwrap();
        assert_eq!(matched.pool, "B");

        let matched = router.resolve(Entrypoint::Http, "example.com", "/index.html").unwrap();
        assert_eq!(matched.pool, "A");
    }

    #[test]
    fn test_longest_prefix_then_host() {
        let router = Router::from_config(&[
            route("api", &[], &["/api"], "api"),
            route("api-v2", &[], &["/api/v2"], "v2"),
            route("wild", &["*.example.com"], &["/api/v2"], "wild"),
            route("exact", &["shop.example.com"], &["/api/v2"], "exact"),
        ])
        .unwrap();

        let resolve = |host, path| {
            router
                .resolve(Entrypoint::Http, host, path)
                .unwrap()
                .pool
                .clone()
        };
        assert_eq!(resolve("other.org", "/api/x"), "api");
        assert_eq!(resolve("other.org", "/api/v2/x"), "v2");
        assert_eq!(resolve("blog.example.com", "/api/v2/x"), "wild");
        assert_eq!(resolve("shop.example.com", "/api/v2/x"), "exact");
    }

    #[test]
    fn test_ties_go_to_first_declared() {
        let router = Router::from_config(&[
            route("first", &[], &["/"], "one"),
            route("second", &[], &["/"], "two"),
        ])
        .unwrap();

        for _ in 0..10 {
            assert_eq!(router.resolve(Entrypoint::Http, "h", "/x").unwrap().name, "first");
        }
    }

    #[test]
    fn test_no_route_found() {
        let router = Router::from_config(&[route("site", &["example.com"], &[], "A")]).unwrap();
        let err = router.resolve(Entrypoint::Http, "Other.com:80", "/").unwrap_err();
        assert!(matches!(err, ProxyError::NoRouteFound { ref host, .. } if host == "other.com"));
    }

    #[test]
    fn test_entrypoint_filters_routes() {
        let mut secure = route("secure", &["example.com"], &[], "tls");
        secure.entrypoint = Entrypoint::Https;
        let plain = route("plain", &["example.com"], &[], "plain");
        let router = Router::from_config(&[secure, plain]).unwrap();

        assert_eq!(router.resolve(Entrypoint::Https, "example.com", "/").unwrap().pool, "tls");
        assert_eq!(router.resolve(Entrypoint::Http, "example.com", "/").unwrap().pool, "plain");
    }
}

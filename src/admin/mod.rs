//! Management API.
//!
//! Read-only JSON views of the live routing table, served on its own
//! entrypoint. Never routes application traffic.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<Registry>,
    pub config: AdminConfig,
    pub started: Instant,
}

impl AdminState {
    pub fn new(registry: Arc<Registry>, config: AdminConfig) -> Self {
        Self {
            registry,
            config,
            started: Instant::now(),
        }
    }
}

/// `/ping` is open; everything under `/api` requires the API key.
pub fn admin_router(state: AdminState) -> Router {
    let api = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/routes", get(get_routes))
        .route("/api/pools", get(get_pools))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/ping", get(ping))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

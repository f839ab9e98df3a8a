//! HTTP server setup and the edge listener.
//!
//! # Responsibilities
//! - Create an Axum router per entrypoint
//! - Wire up middleware (tracing, body limit, request ID)
//! - Serve every bound entrypoint, plus the management API
//! - Dispatch requests: resolve route, select instance, forward
//! - Apply configuration reloads while serving
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::Handle;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::{admin_router, AdminState};
use crate::config::{ConfigError, Entrypoint, ProxyConfig};
use crate::error::ProxyError;
use crate::health::HealthMonitor;
use crate::http::request::{request_host, request_id, upstream_request, UuidRequestId, X_REQUEST_ID};
use crate::http::response::from_upstream;
use crate::net::{Entrypoints, ListenerError};
use crate::observability::access_log::AccessLogEntry;
use crate::observability::metrics;
use crate::registry::{Registry, RoutingTable};

/// Everything a request handler needs, shared by all entrypoints.
#[derive(Clone)]
pub struct ProxyContext {
    registry: Arc<Registry>,
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
}

impl ProxyContext {
    /// Compile the initial routing table and build the upstream client.
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let registry = Arc::new(Registry::new(config)?);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.timeouts.connect()));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            registry,
            client,
            upstream_timeout: config.timeouts.upstream(),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

/// Per-entrypoint handler state.
#[derive(Clone)]
struct EdgeState {
    context: ProxyContext,
    entrypoint: Entrypoint,
}

/// Build the proxy router for one entrypoint.
pub fn edge_router(context: ProxyContext, entrypoint: Entrypoint, max_body_size: usize) -> Router {
    let state = EdgeState { context, entrypoint };

    Router::new()
        .route("/{*path}", any(proxy_handler))
        .route("/", any(proxy_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(RequestBodyLimitLayer::new(max_body_size)),
        )
}

/// The edge listener: serves every entrypoint until shutdown.
pub struct EdgeServer {
    context: ProxyContext,
    config: ProxyConfig,
}

impl EdgeServer {
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let context = ProxyContext::new(&config)?;
        Ok(Self { context, config })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.context.registry()
    }

    /// Serve until `shutdown` fires or an entrypoint fails.
    ///
    /// New configurations arriving on `config_updates` replace the routing
    /// table atomically; a rejected one is logged and the current table keeps
    /// serving. On exit each entrypoint stops accepting, in-flight requests
    /// get `shutdown.grace_secs` to finish, then remaining connections close.
    pub async fn run(
        self,
        entrypoints: Entrypoints,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let Self { context, config } = self;
        let Entrypoints { http, https, admin } = entrypoints;
        let max_body_size = config.listener.max_body_size;

        let monitor = HealthMonitor::new(Arc::clone(context.registry()));
        let monitor_task = tokio::spawn(monitor.run(shutdown.resubscribe()));

        let mut servers = JoinSet::new();
        let mut handles = Vec::new();

        let handle = Handle::new();
        let app = edge_router(context.clone(), Entrypoint::Http, max_body_size)
            .into_make_service_with_connect_info::<SocketAddr>();
        tracing::info!(
            entrypoint = "http",
            address = ?http.local_addr().ok(),
            "Entrypoint serving"
        );
        servers.spawn(axum_server::from_tcp(http).handle(handle.clone()).serve(app));
        handles.push(handle);

        if let Some((listener, tls)) = https {
            let handle = Handle::new();
            let app = edge_router(context.clone(), Entrypoint::Https, max_body_size)
                .into_make_service_with_connect_info::<SocketAddr>();
            tracing::info!(
                entrypoint = "https",
                address = ?listener.local_addr().ok(),
                "Entrypoint serving"
            );
            servers.spawn(
                axum_server::from_tcp_rustls(listener, tls)
                    .handle(handle.clone())
                    .serve(app),
            );
            handles.push(handle);
        }

        if let Some(listener) = admin {
            let handle = Handle::new();
            let state = AdminState::new(Arc::clone(context.registry()), config.admin.clone());
            let app = admin_router(state).into_make_service();
            tracing::info!(address = ?listener.local_addr().ok(), "Admin API serving");
            servers.spawn(axum_server::from_tcp(listener).handle(handle.clone()).serve(app));
            handles.push(handle);
        }

        let result = loop {
            tokio::select! {
                Some(update) = config_updates.recv() => {
                    apply_reload(&context, &config, &update);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, draining connections");
                    break Ok(());
                }
                Some(joined) = servers.join_next() => {
                    let error = match joined {
                        Ok(Ok(())) => std::io::Error::other("entrypoint stopped unexpectedly"),
                        Ok(Err(e)) => e,
                        Err(e) => std::io::Error::other(e.to_string()),
                    };
                    tracing::error!(error = %error, "Entrypoint failed, shutting down");
                    break Err(ListenerError::Serve(error));
                }
            }
        };

        let grace = config.shutdown.grace();
        for handle in &handles {
            handle.graceful_shutdown(Some(grace));
        }
        while let Some(joined) = servers.join_next().await {
            if let Ok(Err(e)) = joined {
                tracing::warn!(error = %e, "Entrypoint closed with error");
            }
        }
        monitor_task.abort();

        tracing::info!("Edge server stopped");
        result
    }
}

fn apply_reload(context: &ProxyContext, running: &ProxyConfig, update: &ProxyConfig) {
    match context.registry().reload(update) {
        Ok(version) => {
            tracing::info!(
                version,
                routes = update.routes.len(),
                pools = update.pools.len(),
                "Configuration reloaded"
            );
            metrics::record_reload(true);
        }
        Err(e) => {
            tracing::error!(error = %e, "Configuration rejected, keeping current routing table");
            metrics::record_reload(false);
            return;
        }
    }

    if update.listener != running.listener || update.admin != running.admin {
        tracing::warn!("Listener and admin settings changed; they take effect on restart");
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<EdgeState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    // One table for the whole request, even if a reload lands mid-flight.
    let table = state.context.registry.snapshot();
    let mut entry = AccessLogEntry::new(
        request_id(&request),
        request.method(),
        request.uri().path(),
    );

    let response = match forward(&state, &table, peer, request, &mut entry).await {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(
                request_id = %entry.request_id,
                path = %entry.path,
                error = %error,
                "Request failed"
            );
            error.into_response()
        }
    };

    let elapsed = start.elapsed();
    entry.finish(response.status(), elapsed);
    entry.emit();
    metrics::record_request(
        &entry.method,
        entry.status,
        entry.pool.as_deref().unwrap_or("none"),
        elapsed,
    );

    response
}

async fn forward(
    state: &EdgeState,
    table: &RoutingTable,
    peer: SocketAddr,
    request: Request<Body>,
    entry: &mut AccessLogEntry,
) -> Result<Response, ProxyError> {
    let host = request_host(&request);
    let route = table.resolve(state.entrypoint, &host, request.uri().path())?;
    entry.route = Some(route.name.clone());
    entry.pool = Some(route.pool.clone());

    let instance = table.select(&route.pool)?;
    entry.instance = Some(instance.address().to_string());
    let in_flight = instance.track_request();

    tracing::debug!(
        request_id = %entry.request_id,
        route = %route.name,
        instance = %instance.address(),
        "Forwarding request"
    );

    let upstream = upstream_request(request, instance.address(), peer, state.entrypoint)
        .map_err(|e| ProxyError::Upstream {
            instance: instance.address().to_string(),
            reason: e.to_string(),
        })?;

    let timeout = state.context.upstream_timeout;
    match tokio::time::timeout(timeout, state.context.client.request(upstream)).await {
        Ok(Ok(response)) => Ok(from_upstream(response, in_flight, timeout)),
        Ok(Err(e)) => Err(ProxyError::Upstream {
            instance: instance.address().to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ProxyError::UpstreamTimeout {
            instance: instance.address().to_string(),
            timeout,
        }),
    }
}

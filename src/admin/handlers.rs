use std::time::UNIX_EPOCH;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::health::HealthState;
use crate::load_balancer::{Instance, Pool};
use crate::routing::CompiledRoute;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub table_version: u64,
    pub uptime_secs: u64,
    pub routes: usize,
    pub pools: usize,
    pub healthy_instances: usize,
    pub total_instances: usize,
}

#[derive(Serialize)]
pub struct RoutesView {
    pub table_version: u64,
    pub routes: Vec<CompiledRoute>,
}

#[derive(Serialize)]
pub struct PoolStatus {
    pub id: String,
    pub balancer: &'static str,
    pub depends_on: Vec<String>,
    pub available: bool,
    pub health_check: bool,
    pub instances: Vec<InstanceStatus>,
}

#[derive(Serialize)]
pub struct InstanceStatus {
    pub address: String,
    pub health: HealthState,
    /// Unix time of the last completed probe, in milliseconds.
    pub last_check_ms: Option<u64>,
    pub active_requests: usize,
}

impl From<&Instance> for InstanceStatus {
    fn from(instance: &Instance) -> Self {
        Self {
            address: instance.address().to_string(),
            health: instance.health(),
            last_check_ms: instance
                .last_check()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64),
            active_requests: instance.active_requests(),
        }
    }
}

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let table = state.registry.snapshot();
    let instances = table.pools().iter().flat_map(|p| p.instances());
    let (total, healthy) = instances.fold((0, 0), |(total, healthy), i| {
        (total + 1, healthy + usize::from(i.is_healthy()))
    });

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        table_version: table.version(),
        uptime_secs: state.started.elapsed().as_secs(),
        routes: table.routes().len(),
        pools: table.pools().len(),
        healthy_instances: healthy,
        total_instances: total,
    })
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<RoutesView> {
    let table = state.registry.snapshot();
    Json(RoutesView {
        table_version: table.version(),
        routes: table.routes().to_vec(),
    })
}

pub async fn get_pools(State(state): State<AdminState>) -> Json<Vec<PoolStatus>> {
    let table = state.registry.snapshot();
    let statuses = table
        .pools()
        .iter()
        .map(|pool| pool_status(pool, table.is_available(pool.id())))
        .collect();
    Json(statuses)
}

fn pool_status(pool: &Pool, available: bool) -> PoolStatus {
    PoolStatus {
        id: pool.id().to_string(),
        balancer: pool.balancer_name(),
        depends_on: pool.depends_on().to_vec(),
        available,
        health_check: pool.health_check().enabled,
        instances: pool.instances().iter().map(|i| InstanceStatus::from(i.as_ref())).collect(),
    }
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::load_balancer::group::GroupSnapshot;
use crate::load_balancer::{GroupKey, SchedulerError, ServerKey};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub lb: &'static str,
    pub active_connections: u64,
    pub tracked_pairs: usize,
    pub verdict_cache_entries: usize,
    pub verdict_cache_capacity: usize,
    pub security_filters: Vec<String>,
}

#[derive(Serialize)]
pub struct AdminError {
    pub error: String,
}

type AdminResult<T> = Result<Json<T>, (StatusCode, Json<AdminError>)>;

fn admin_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<AdminError>) {
    (status, Json(AdminError { error: message.into() }))
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let settings = state.coordinator.settings_store().load();
    let cache = state.coordinator.settings_store().verdict_cache();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started.elapsed().as_secs(),
        lb: if settings.lb_enabled() { "on" } else { "off" },
        active_connections: state.tracker.active_count(),
        tracked_pairs: state.coordinator.active_pairs(),
        verdict_cache_entries: cache.len(),
        verdict_cache_capacity: cache.capacity(),
        security_filters: settings.request.chain().filter_ids(),
    })
}

pub async fn get_upstreams(State(state): State<AdminState>) -> Json<Vec<GroupSnapshot>> {
    Json(state.coordinator.scheduler().snapshot())
}

pub async fn recover_server(
    State(state): State<AdminState>,
    Path((group, server)): Path<(String, String)>,
) -> AdminResult<GroupSnapshot> {
    let (group, server) = parse_keys(&group, &server)?;
    let scheduler = state.coordinator.scheduler();
    scheduler
        .report_recovered(&group, &server)
        .map_err(scheduler_error)?;
    tracing::info!(group = %group, server = %server, "Server reinstated by operator");
    snapshot_of(&state, &group)
}

pub async fn evict_server(
    State(state): State<AdminState>,
    Path((group, server)): Path<(String, String)>,
) -> AdminResult<GroupSnapshot> {
    let (group, server) = parse_keys(&group, &server)?;
    let scheduler = state.coordinator.scheduler();
    scheduler
        .report_failure(&group, &server)
        .map_err(scheduler_error)?;
    tracing::info!(group = %group, server = %server, "Server evicted by operator");
    snapshot_of(&state, &group)
}

fn parse_keys(group: &str, server: &str) -> Result<(GroupKey, ServerKey), (StatusCode, Json<AdminError>)> {
    let group = GroupKey::parse(group)
        .ok_or_else(|| admin_error(StatusCode::BAD_REQUEST, format!("invalid group key {group:?}, expected host_port")))?;
    let server = ServerKey::parse(server)
        .ok_or_else(|| admin_error(StatusCode::BAD_REQUEST, format!("invalid server key {server:?}, expected host:port")))?;
    Ok((group, server))
}

fn scheduler_error(e: SchedulerError) -> (StatusCode, Json<AdminError>) {
    let status = match e {
        SchedulerError::UnknownGroup(_) | SchedulerError::UnknownServer { .. } => StatusCode::NOT_FOUND,
        SchedulerError::NoHealthyServer(_) => StatusCode::CONFLICT,
    };
    admin_error(status, e.to_string())
}

fn snapshot_of(state: &AdminState, group: &GroupKey) -> AdminResult<GroupSnapshot> {
    state
        .coordinator
        .scheduler()
        .group(group)
        .map(|g| Json(g.snapshot()))
        .ok_or_else(|| admin_error(StatusCode::NOT_FOUND, format!("unknown group {group}")))
}

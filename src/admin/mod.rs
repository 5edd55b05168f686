//! Read-only admin/diagnostics surface (instance lookup, queue depth, lock
//! status). Carried because the manifest already budgets `axum`/`utoipa` for
//! an HTTP admin API; this is diagnostic tooling, not the Control Plane
//! façade — it exposes no mutation endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::lock::LockManager;
use crate::model::WorkflowInstance;
use crate::persistence::InstanceStore;
use crate::queue::JobQueue;

#[derive(Clone)]
pub struct AppState {
    pub instances: Arc<dyn InstanceStore>,
    pub queue: Arc<dyn JobQueue>,
    pub locks: Arc<dyn LockManager>,
}

#[derive(Serialize)]
struct QueueDepthResponse {
    pending: u64,
}

#[derive(Serialize)]
struct LockStatusResponse {
    key: String,
    locked: bool,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/instances/:id", get(get_instance))
        .route("/admin/queue/depth", get(queue_depth))
        .route("/admin/locks/:key", get(lock_status))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/admin/instances/{id}",
    params(("id" = Uuid, Path, description = "Workflow instance id")),
    responses(
        (status = 200, description = "Instance found", body = String),
        (status = 404, description = "No such instance")
    ),
    tag = "admin"
)]
async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowInstance>, StatusCode> {
    state.instances.get(id).await.map(Json).map_err(|_| StatusCode::NOT_FOUND)
}

#[utoipa::path(
    get,
    path = "/admin/queue/depth",
    responses((status = 200, description = "Pending job count", body = String)),
    tag = "admin"
)]
async fn queue_depth(State(state): State<AppState>) -> Result<Json<QueueDepthResponse>, StatusCode> {
    state
        .queue
        .pending_len()
        .await
        .map(|pending| Json(QueueDepthResponse { pending }))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[utoipa::path(
    get,
    path = "/admin/locks/{key}",
    params(("key" = String, Path, description = "Lock key")),
    responses((status = 200, description = "Lock status", body = String)),
    tag = "admin"
)]
async fn lock_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LockStatusResponse>, StatusCode> {
    state
        .locks
        .is_locked(&key)
        .await
        .map(|locked| Json(LockStatusResponse { key, locked }))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

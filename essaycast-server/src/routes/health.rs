//! Liveness endpoint with a summary of the task table.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use essaycast_core::TaskStatus;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthResponse, TaskCounts)))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Number of known tasks per lifecycle status.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct TaskCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Submissions the orchestrator accepts before answering 503.
    pub queue_capacity: usize,
    pub tasks: TaskCounts,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut tasks = TaskCounts::default();
    for (_, snapshot) in state.orchestrator.list().await {
        match snapshot.status {
            TaskStatus::Queued => tasks.queued += 1,
            TaskStatus::Processing => tasks.processing += 1,
            TaskStatus::Completed => tasks.completed += 1,
            TaskStatus::Failed => tasks.failed += 1,
        }
    }

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue_capacity: state.orchestrator.config().queue_capacity,
        tasks,
    })
}

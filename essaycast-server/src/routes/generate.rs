//! Video generation endpoints.
//!
//! `POST /generate` admits a request and returns its task id immediately;
//! callers then poll `GET /status/{task_id}` and download the result from
//! `GET /video/{task_id}` once the status is `completed`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use essaycast_core::{RuntimeError, TaskId};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::{self, GenerateBody, GenerateResponse, StatusResponse, TaskSummary};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate_video, get_status, get_video, list_tasks),
    components(schemas(GenerateBody, GenerateResponse, StatusResponse, TaskSummary))
)]
pub struct GenerateApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate_video))
        .route("/status/{task_id}", get(get_status))
        .route("/video/{task_id}", get(get_video))
        .route("/tasks", get(list_tasks))
}

/// Unknown and malformed ids are both "not found".
fn parse_task_id(raw: &str) -> Result<TaskId, ServerError> {
    TaskId::parse_str(raw).map_err(|_| ServerError::NotFound("Task not found".to_owned()))
}

#[utoipa::path(
    post,
    path = "/generate",
    tag = "generate",
    request_body = GenerateBody,
    responses(
        (status = 200, description = "Task queued", body = GenerateResponse),
        (status = 400, description = "Invalid request"),
        (status = 503, description = "Submission queue full"),
    )
)]
pub async fn generate_video(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, ServerError> {
    let request = body.into_request()?;
    let task_id = state.orchestrator.submit(request).await?;
    info!(%task_id, "generation task accepted");
    Ok(Json(GenerateResponse {
        task_id,
        status: schemas::queued(),
    }))
}

#[utoipa::path(
    get,
    path = "/status/{task_id}",
    tag = "generate",
    params(("task_id" = String, Path, description = "Task id returned by /generate")),
    responses(
        (status = 200, description = "Current task state", body = StatusResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    let task_id = parse_task_id(&task_id)?;
    let snapshot = state.orchestrator.poll(task_id).await?;
    Ok(Json(snapshot.into()))
}

#[utoipa::path(
    get,
    path = "/video/{task_id}",
    tag = "generate",
    params(("task_id" = String, Path, description = "Task id returned by /generate")),
    responses(
        (status = 200, description = "The MP4 file", content_type = "video/mp4"),
        (status = 400, description = "Video generation not completed"),
        (status = 404, description = "Task or video file not found"),
    )
)]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    request: Request,
) -> Result<Response, ServerError> {
    let task_id = parse_task_id(&task_id)?;
    let path = state.orchestrator.fetch_artifact(task_id).await?;

    // Streams from disk; honours Range requests.
    let Ok(served) = ServeFile::new(&path).oneshot(request).await;
    if served.status() == StatusCode::NOT_FOUND {
        return Err(RuntimeError::ArtifactMissing { task_id, path }.into());
    }

    let mut response = served.map(Body::new);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"video_{task_id}.mp4\""))
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "generate",
    responses(
        (status = 200, description = "All known tasks, oldest first", body = [TaskSummary]),
    )
)]
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskSummary>> {
    let tasks = state.orchestrator.list().await;
    Json(
        tasks
            .iter()
            .map(|(id, snapshot)| TaskSummary::new(*id, snapshot))
            .collect(),
    )
}

//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`]. Pipeline failures and I/O errors are
//! logged with full detail; callers only see a short message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use essaycast_core::RuntimeError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the generation runtime.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Runtime(e) => match e {
                RuntimeError::InvalidInput(m) => (StatusCode::BAD_REQUEST, m.clone()),
                RuntimeError::TaskNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "Task not found".to_owned())
                }
                RuntimeError::NotCompleted { .. } => (
                    StatusCode::BAD_REQUEST,
                    "Video generation not completed".to_owned(),
                ),
                RuntimeError::OrchestratorQueueFull { .. } | RuntimeError::Shutdown => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "server is busy, try again later".to_owned(),
                ),
                RuntimeError::ArtifactMissing { .. } => {
                    error!(error = %e, "artifact inconsistency");
                    (
                        StatusCode::NOT_FOUND,
                        "Video file not found".to_owned(),
                    )
                }
                _ => {
                    error!(error = %e, "runtime error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn status(e: RuntimeError) -> (StatusCode, String) {
        ServerError::Runtime(e).status_and_message()
    }

    #[test]
    fn caller_errors_keep_their_message() {
        let (code, msg) = status(RuntimeError::InvalidInput(
            "Number of images must be between 1 and 10".into(),
        ));
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Number of images must be between 1 and 10");
    }

    #[test]
    fn lookup_errors_map_to_not_found_and_precondition() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            status(RuntimeError::TaskNotFound { task_id: id }).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(RuntimeError::NotCompleted {
                task_id: id,
                status: essaycast_core::TaskStatus::Processing,
            }),
            (
                StatusCode::BAD_REQUEST,
                "Video generation not completed".to_owned()
            )
        );
    }

    #[test]
    fn missing_artifact_is_404_without_leaking_the_path() {
        let id = uuid::Uuid::new_v4();
        let (code, msg) = status(RuntimeError::ArtifactMissing {
            task_id: id,
            path: format!("/srv/output/{id}/{id}.mp4").into(),
        });
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert!(!msg.contains("/srv"));
    }

    #[test]
    fn internal_details_are_hidden() {
        let (code, msg) = status(RuntimeError::Upstream {
            stage: "compose".into(),
            message: "ffmpeg exited with exit status: 1 at /tmp/x".into(),
        });
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "internal server error");
    }
}

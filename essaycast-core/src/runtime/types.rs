use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Unique identifier for a submitted generation task.
pub type TaskId = uuid::Uuid;

/// High-level lifecycle state of a task managed by the [`Orchestrator`].
///
/// Transitions only ever follow `Queued -> Processing -> {Completed | Failed}`.
///
/// [`Orchestrator`]: crate::runtime::orchestrator::Orchestrator
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    /// Task has been admitted but no stage has started yet.
    Queued,
    /// Task is executing one of its stages.
    Processing,
    /// The final video has been produced and relocated.
    Completed,
    /// A stage failed; `TaskState::error` carries the reason.
    Failed,
}

impl TaskStatus {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self -> next` is a legal lifecycle step.
    ///
    /// Self-transitions are allowed for `Processing` so that progress can be
    /// updated repeatedly while a task runs.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

/// Caller-visible snapshot of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub status: TaskStatus,
    /// Display label of the active stage; never used for control decisions.
    pub current_step: String,
    /// Percentage in `[0, 100]`, non-decreasing for the task's lifetime.
    pub progress: f32,
    /// Present only when `status == Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskState {
    pub(crate) fn queued() -> Self {
        let now = Utc::now();
        Self {
            status: TaskStatus::Queued,
            current_step: "Initializing".to_owned(),
            progress: 0.0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Errors produced by the runtime layer.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The request was rejected before admission.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced task does not exist.
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },

    /// The artifact was requested before the task completed.
    #[error("task {task_id} is not completed (status: {status})")]
    NotCompleted { task_id: TaskId, status: TaskStatus },

    /// The task reports completion but its video is not on disk.
    #[error("task {task_id} is completed but its artifact is missing at {}", path.display())]
    ArtifactMissing { task_id: TaskId, path: PathBuf },

    /// An external capability failed while running the named stage.
    #[error("{stage} failed: {message}")]
    Upstream { stage: String, message: String },

    /// A state update tried to leave a terminal state or go backwards.
    #[error("illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Orchestrator submission queue is full.
    #[error("orchestrator queue full (capacity {capacity})")]
    OrchestratorQueueFull { capacity: usize },

    /// The orchestrator dispatch loop is gone.
    #[error("orchestrator shut down")]
    Shutdown,

    /// Filesystem error while preparing or relocating task artifacts.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RuntimeError {
    fn from(e: std::io::Error) -> Self {
        RuntimeError::Io(e.to_string())
    }
}

impl From<crate::language::LanguageError> for RuntimeError {
    fn from(e: crate::language::LanguageError) -> Self {
        RuntimeError::InvalidInput(e.to_string())
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::runtime::types::{RuntimeError, TaskId, TaskState, TaskStatus};

/// Thread-safe registry of task states.
///
/// Uses a `tokio::sync::RwLock<HashMap>` so any number of pollers can read
/// snapshots concurrently while each task's own execution path is the only
/// writer for its entry. Entries are never removed here; retention belongs to
/// the caller.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<HashMap<TaskId, TaskState>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a `Queued` record for it.
    pub async fn create(&self) -> TaskId {
        let task_id = uuid::Uuid::new_v4();
        self.inner.write().await.insert(task_id, TaskState::queued());
        task_id
    }

    /// Snapshot of one task.
    pub async fn get(&self, task_id: TaskId) -> Option<TaskState> {
        self.inner.read().await.get(&task_id).cloned()
    }

    /// Snapshot of every task, oldest first.
    pub async fn list(&self) -> Vec<(TaskId, TaskState)> {
        let mut all: Vec<_> = self
            .inner
            .read()
            .await
            .iter()
            .map(|(id, state)| (*id, state.clone()))
            .collect();
        all.sort_by_key(|(_, state)| state.created_at);
        all
    }

    /// Move a task to `status` with a new step label and progress.
    ///
    /// Rejects transitions not allowed by [`TaskStatus::can_transition_to`].
    /// Progress is clamped to `[0, 100]` and never lowered.
    pub async fn update(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        step: impl Into<String>,
        progress: f32,
    ) -> Result<TaskState, RuntimeError> {
        let step = step.into();
        self.apply(task_id, status, move |state| {
            state.current_step = step;
            state.progress = state.progress.max(progress.clamp(0.0, 100.0));
        })
        .await
    }

    /// Mark a task failed with a human-readable reason. Progress is kept.
    pub async fn fail(
        &self,
        task_id: TaskId,
        error: impl Into<String>,
    ) -> Result<TaskState, RuntimeError> {
        let error = error.into();
        self.apply(task_id, TaskStatus::Failed, move |state| {
            state.current_step = "Error occurred".to_owned();
            state.error = Some(error);
        })
        .await
    }

    async fn apply(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        mutate: impl FnOnce(&mut TaskState),
    ) -> Result<TaskState, RuntimeError> {
        let mut guard = self.inner.write().await;
        let state = guard
            .get_mut(&task_id)
            .ok_or(RuntimeError::TaskNotFound { task_id })?;
        if !state.status.can_transition_to(status) {
            return Err(RuntimeError::IllegalTransition {
                task_id,
                from: state.status,
                to: status,
            });
        }
        state.status = status;
        mutate(state);
        state.updated_at = Utc::now();
        Ok(state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_starts_queued_at_zero() {
        let store = TaskStore::new();
        let id = store.create().await;
        let state = store.get(id).await.unwrap();
        assert_eq!(state.status, TaskStatus::Queued);
        assert_eq!(state.progress, 0.0);
        assert_eq!(state.current_step, "Initializing");
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn progress_is_never_lowered() {
        let store = TaskStore::new();
        let id = store.create().await;
        store.update(id, TaskStatus::Processing, "b", 60.0).await.unwrap();
        let state = store.update(id, TaskStatus::Processing, "a", 20.0).await.unwrap();
        assert_eq!(state.progress, 60.0);
        assert_eq!(state.current_step, "a");
        let state = store.update(id, TaskStatus::Processing, "c", 250.0).await.unwrap();
        assert_eq!(state.progress, 100.0);
    }

    #[tokio::test]
    async fn terminal_states_are_final() {
        let store = TaskStore::new();
        let id = store.create().await;
        store.update(id, TaskStatus::Processing, "x", 10.0).await.unwrap();
        store.update(id, TaskStatus::Completed, "done", 100.0).await.unwrap();

        let err = store.update(id, TaskStatus::Processing, "again", 100.0).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::IllegalTransition {
                from: TaskStatus::Completed,
                to: TaskStatus::Processing,
                ..
            }
        ));
        assert!(store.fail(id, "late").await.is_err());
        assert_eq!(store.get(id).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn queued_cannot_jump_to_completed() {
        let store = TaskStore::new();
        let id = store.create().await;
        assert!(store.update(id, TaskStatus::Completed, "done", 100.0).await.is_err());
    }

    #[tokio::test]
    async fn queued_task_cannot_fail_without_processing() {
        let store = TaskStore::new();
        let id = store.create().await;
        assert!(matches!(
            store.fail(id, "too early").await,
            Err(RuntimeError::IllegalTransition {
                from: TaskStatus::Queued,
                to: TaskStatus::Failed,
                ..
            })
        ));
        assert_eq!(store.get(id).await.unwrap().status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn fail_keeps_progress_and_records_error() {
        let store = TaskStore::new();
        let id = store.create().await;
        store.update(id, TaskStatus::Processing, "images", 60.0).await.unwrap();
        let state = store.fail(id, "images failed: boom").await.unwrap();
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(state.progress, 60.0);
        assert_eq!(state.error.as_deref(), Some("images failed: boom"));
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let store = TaskStore::new();
        let id = uuid::Uuid::new_v4();
        assert!(store.get(id).await.is_none());
        assert!(matches!(
            store.update(id, TaskStatus::Processing, "x", 0.0).await,
            Err(RuntimeError::TaskNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_is_ordered_by_creation() {
        let store = TaskStore::new();
        let first = store.create().await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create().await;
        let ids: Vec<TaskId> = store.list().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}

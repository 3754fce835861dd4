//! Shared in-memory task map behind an async `RwLock`.
//!
//! Every mutation goes through [`TaskStore::update`], which is atomic per
//! key and refuses to touch a terminal task. That refusal is what makes
//! "first terminal write wins" races (worker vs. deadline watchdog) safe
//! without any coordination between the writers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::{Task, TaskError, TaskId};
use crate::model::ModelKind;

#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh Queued task and return a snapshot of it.
    pub async fn create(&self, model_name: ModelKind) -> Task {
        let task = Task::new(model_name);
        let snapshot = task.clone();
        self.inner.write().await.insert(task.id, task);
        snapshot
    }

    /// Snapshot of one task.
    pub async fn get(&self, id: TaskId) -> Result<Task, TaskError> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TaskError::NotFound(id))
    }

    /// Apply `mutate` to the task under the write lock, bumping `updated_at`.
    ///
    /// Returns [`TaskError::TerminalState`] without invoking `mutate` if the
    /// task already completed or failed.
    pub async fn update<F>(&self, id: TaskId, mutate: F) -> Result<Task, TaskError>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.inner.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskError::NotFound(id))?;
        if task.status.is_terminal() {
            return Err(TaskError::TerminalState(id));
        }
        mutate(task);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    /// Remove the record, returning it for file cleanup by the caller.
    pub async fn remove(&self, id: TaskId) -> Result<Task, TaskError> {
        self.inner
            .write()
            .await
            .remove(&id)
            .ok_or(TaskError::NotFound(id))
    }

    /// Snapshot of every task, newest first.
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.inner.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let store = TaskStore::new();
        let task = store.create(ModelKind::MotionClone).await;
        let fetched = store.get(task.id).await.unwrap();
        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = TaskStore::new();
        let err = store.get(TaskId::new_v4()).await.unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_bumps_updated_at() {
        let store = TaskStore::new();
        let task = store.create(ModelKind::Fomm).await;
        let before = task.updated_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let after = store
            .update(task.id, |t| t.set_progress(25))
            .await
            .unwrap();
        assert_eq!(after.status, TaskStatus::Processing);
        assert_eq!(after.progress, 25);
        assert!(after.updated_at > before);
    }

    #[tokio::test]
    async fn terminal_tasks_refuse_further_updates() {
        let store = TaskStore::new();
        let task = store.create(ModelKind::MotionClone).await;

        store
            .update(task.id, |t| t.fail("decode failed"))
            .await
            .unwrap();

        // A late writer (worker finishing after a deadline fired, say) is
        // refused rather than resurrecting the task.
        let err = store
            .update(task.id, |t| t.complete("out.mp4".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::TerminalState(_)));

        let current = store.get(task.id).await.unwrap();
        assert_eq!(current.status, TaskStatus::Failed);
        assert!(current.output_path.is_none());
    }

    #[tokio::test]
    async fn remove_returns_record_once() {
        let store = TaskStore::new();
        let task = store.create(ModelKind::Fomm).await;
        let removed = store.remove(task.id).await.unwrap();
        assert_eq!(removed.id, task.id);
        assert!(matches!(
            store.remove(task.id).await.unwrap_err(),
            TaskError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let store = TaskStore::new();
        let first = store.create(ModelKind::MotionClone).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create(ModelKind::Fomm).await;

        let all = store.list().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }
}

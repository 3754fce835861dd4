use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use uuid::Uuid;

use crate::model::ModelKind;

pub type TaskId = Uuid;

/// Where a generation task sits in its lifecycle.
///
/// `Completed` and `Failed` are terminal: once a task reaches either, the
/// store refuses any further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Persisted input payload locations for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub source: PathBuf,
    pub driving: PathBuf,
}

/// One generation request as tracked by the store.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Coarse completion percentage; monotone while Processing.
    pub progress: u8,
    pub model_name: ModelKind,
    pub input_paths: Option<InputPaths>,
    /// Set exactly when the task completes.
    pub output_path: Option<PathBuf>,
    /// Set exactly when the task fails.
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(model_name: ModelKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: TaskStatus::Queued,
            progress: 0,
            model_name,
            input_paths: None,
            output_path: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.status = TaskStatus::Processing;
        self.progress = progress;
    }

    pub fn complete(&mut self, output_path: PathBuf) {
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.output_path = Some(output_path);
    }

    pub fn fail(&mut self, detail: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error_detail = Some(detail.into());
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The task already reached Completed or Failed.
    #[error("task {0} is in a terminal state")]
    TerminalState(TaskId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn new_task_starts_queued_with_zero_progress() {
        let task = Task::new(ModelKind::MotionClone);
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0);
        assert!(task.output_path.is_none());
        assert!(task.error_detail.is_none());
    }

    #[test]
    fn complete_sets_output_and_full_progress() {
        let mut task = Task::new(ModelKind::Fomm);
        task.complete(PathBuf::from("/results/out.mp4"));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.output_path.is_some());
    }
}

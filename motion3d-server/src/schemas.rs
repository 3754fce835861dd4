//! Wire shapes for the HTTP API.

use chrono::{DateTime, Utc};
use motion3d_core::model::ModelAvailability;
use motion3d_core::{BenchmarkReport, Task};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Accepted-submission acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    pub task_id: Uuid,
}

/// Snapshot of one generation task.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub task_id: Uuid,
    /// `queued | processing | completed | failed`.
    pub status: String,
    pub progress: u8,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status.to_string(),
            progress: task.progress,
            model_name: task.model_name.to_string(),
            output_path: task
                .output_path
                .map(|p| p.to_string_lossy().into_owned()),
            error: task.error_detail,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// One model variant with its lifecycle status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModelResponse {
    pub name: String,
    pub device: String,
    pub available: bool,
    pub loaded: bool,
    pub current: bool,
}

impl From<ModelAvailability> for ModelResponse {
    fn from(m: ModelAvailability) -> Self {
        Self {
            name: m.name.to_string(),
            device: m.device,
            available: m.available,
            loaded: m.loaded,
            current: m.current,
        }
    }
}

/// Timing statistics from a synchronous benchmark run.
#[derive(Debug, Serialize, ToSchema)]
pub struct BenchmarkResponse {
    pub model_name: String,
    pub num_runs: u32,
    pub frame_count: usize,
    pub avg_time_seconds: f64,
    pub min_time_seconds: f64,
    pub max_time_seconds: f64,
    pub fps: f64,
}

impl From<BenchmarkReport> for BenchmarkResponse {
    fn from(r: BenchmarkReport) -> Self {
        Self {
            model_name: r.model_name.to_string(),
            num_runs: r.num_runs,
            frame_count: r.frame_count,
            avg_time_seconds: r.avg_time_seconds,
            min_time_seconds: r.min_time_seconds,
            max_time_seconds: r.max_time_seconds,
            fps: r.fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion3d_core::ModelKind;

    #[test]
    fn task_response_flattens_paths_and_status() {
        let mut task = Task::new(ModelKind::MotionClone);
        task.complete("/data/results/out.mp4".into());
        let resp = TaskResponse::from(task);
        assert_eq!(resp.status, "completed");
        assert_eq!(resp.progress, 100);
        assert_eq!(resp.model_name, "motion_clone");
        assert_eq!(resp.output_path.as_deref(), Some("/data/results/out.mp4"));
        assert!(resp.error.is_none());
    }

    #[test]
    fn pending_task_omits_optional_fields_in_json() {
        let task = Task::new(ModelKind::Fomm);
        let json = serde_json::to_value(TaskResponse::from(task)).unwrap();
        assert!(json.get("output_path").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "queued");
    }
}

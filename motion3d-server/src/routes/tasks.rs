//! Task inspection, result download and deletion.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use motion3d_core::{TaskId, TaskStatus};
use serde_json::json;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::ServerError;
use crate::schemas::TaskResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, get_task, download_result, delete_task),
    components(schemas(TaskResponse))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/task/{id}", get(get_task).delete(delete_task))
        .route("/download/{id}", get(download_result))
}

/// List all tasks, newest first (`GET /tasks`).
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "Tasks listed", body = [TaskResponse]),
    )
)]
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskResponse>> {
    let tasks = state.store.list().await;
    Json(tasks.into_iter().map(TaskResponse::from).collect())
}

/// Fetch one task snapshot (`GET /task/{id}`).
#[utoipa::path(
    get,
    path = "/task/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task retrieved", body = TaskResponse),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskResponse>, ServerError> {
    let task = state.store.get(id).await?;
    Ok(Json(task.into()))
}

/// Download the generated MP4 (`GET /download/{id}`).
///
/// Only valid for Completed tasks; the file is streamed with a
/// content-disposition attachment header.
#[utoipa::path(
    get,
    path = "/download/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "MP4 bytes", content_type = "video/mp4"),
        (status = 400, description = "Task is not completed"),
        (status = 404, description = "Task or output file not found"),
    )
)]
pub async fn download_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Response, ServerError> {
    let task = state.store.get(id).await?;
    if task.status != TaskStatus::Completed {
        return Err(ServerError::BadRequest(format!(
            "task {id} is not completed (status: {})",
            task.status
        )));
    }
    let path = task
        .output_path
        .ok_or_else(|| ServerError::NotFound(format!("task {id} has no output file")))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ServerError::NotFound(format!("output file for task {id} is missing"))
        } else {
            ServerError::Internal(format!("failed to read output for task {id}: {e}"))
        }
    })?;

    let headers = [
        (header::CONTENT_TYPE, "video/mp4".to_owned()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{id}.mp4\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// Delete a task record and its files (`DELETE /task/{id}`).
#[utoipa::path(
    delete,
    path = "/task/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.orchestrator.cleanup(id).await?;
    Ok(Json(json!({ "deleted": id })))
}

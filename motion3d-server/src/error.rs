//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** internal errors are logged with full detail but only a
//! generic message is returned to the caller so that file paths or other
//! implementation details never leak to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use motion3d_core::{MediaError, ModelError, OrchestratorError, TaskError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the motion3d-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the generation engine.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Propagated from the model lifecycle layer.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Propagated from the task store.
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),

            ServerError::Task(e @ TaskError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            ServerError::Task(e @ TaskError::TerminalState(_)) => {
                (StatusCode::CONFLICT, e.to_string())
            }

            ServerError::Model(e) => match e {
                ModelError::UnknownVariant { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
                ModelError::NotFound { name, .. } => (
                    StatusCode::NOT_FOUND,
                    format!("model '{name}' is not available"),
                ),
                ModelError::NoCurrentModel => {
                    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
                }
                ModelError::Load { name, .. } | ModelError::Inference { name, .. } => {
                    error!(error = %e, "model layer error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("model '{name}' failed"),
                    )
                }
            },

            ServerError::Orchestrator(e) => match e {
                OrchestratorError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
                OrchestratorError::QueueFull | OrchestratorError::Shutdown => {
                    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
                }
                OrchestratorError::Media(media) => match media {
                    MediaError::DecodeImage(_)
                    | MediaError::DecodeVideo(_)
                    | MediaError::EmptyVideo => (StatusCode::BAD_REQUEST, media.to_string()),
                    _ => {
                        error!(error = %media, "media error");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "internal server error".to_owned(),
                        )
                    }
                },
                // Nested model errors reuse the model mapping.
                OrchestratorError::Model(model) => {
                    return ServerError::Model(model.clone()).status_and_message();
                }
                OrchestratorError::Task(TaskError::NotFound(id)) => {
                    (StatusCode::NOT_FOUND, format!("task {id} not found"))
                }
                _ => {
                    error!(error = %e, "orchestrator error");
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

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion3d_core::ModelKind;
    use uuid::Uuid;

    fn status_of(err: ServerError) -> StatusCode {
        err.status_and_message().0
    }

    #[test]
    fn queue_full_maps_to_service_unavailable() {
        assert_eq!(
            status_of(ServerError::Orchestrator(OrchestratorError::QueueFull)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn validation_maps_to_bad_request() {
        assert_eq!(
            status_of(ServerError::Orchestrator(OrchestratorError::Validation(
                "bad payload".into()
            ))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unknown_task_maps_to_not_found() {
        assert_eq!(
            status_of(ServerError::Task(TaskError::NotFound(Uuid::new_v4()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn missing_model_maps_to_not_found() {
        assert_eq!(
            status_of(ServerError::Model(ModelError::NotFound {
                name: ModelKind::Fomm,
                path: "/models/fomm/vox-cpk.bin".into(),
            })),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn no_current_model_maps_to_service_unavailable() {
        assert_eq!(
            status_of(ServerError::Model(ModelError::NoCurrentModel)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err = ServerError::Internal("secret /var/lib path".into());
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "internal server error");
    }
}

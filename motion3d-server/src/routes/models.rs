//! Model listing and switching.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use motion3d_core::{ModelError, ModelKind};
use serde_json::json;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::ModelResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_models, current_model, switch_model),
    components(schemas(ModelResponse))
)]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models))
        .route("/model/current", get(current_model))
        .route("/model/switch/{name}", post(switch_model))
}

/// List every known model variant with its lifecycle status
/// (`GET /models`).
#[utoipa::path(
    get,
    path = "/models",
    tag = "models",
    responses(
        (status = 200, description = "Models listed", body = [ModelResponse]),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelResponse>> {
    let models = state.registry.available().await;
    Json(models.into_iter().map(ModelResponse::from).collect())
}

/// The currently designated model (`GET /model/current`).
#[utoipa::path(
    get,
    path = "/model/current",
    tag = "models",
    responses(
        (status = 200, description = "Current model", body = ModelResponse),
        (status = 503, description = "No model is currently loaded"),
    )
)]
pub async fn current_model(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelResponse>, ServerError> {
    let handle = state
        .registry
        .current()
        .await
        .ok_or(ServerError::Model(ModelError::NoCurrentModel))?;
    Ok(Json(ModelResponse {
        name: handle.name.to_string(),
        device: handle.device.to_string(),
        available: true,
        loaded: true,
        current: true,
    }))
}

/// Load (if necessary) and designate a model as current
/// (`POST /model/switch/{name}`).
///
/// On failure the previous current model stays in place.
#[utoipa::path(
    post,
    path = "/model/switch/{name}",
    tag = "models",
    params(("name" = String, Path, description = "Model variant name")),
    responses(
        (status = 200, description = "Model switched"),
        (status = 400, description = "Unknown model variant name"),
        (status = 404, description = "Model checkpoint not available"),
        (status = 500, description = "Checkpoint failed to load"),
    )
)]
pub async fn switch_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let kind: ModelKind = name
        .parse()
        .map_err(|_| ServerError::Model(ModelError::UnknownVariant { name }))?;
    let handle = state.registry.set_current(kind).await?;
    info!(model = %handle.name, "current model switched");
    Ok(Json(json!({
        "current": handle.name.to_string(),
        "device": handle.device.to_string(),
    })))
}

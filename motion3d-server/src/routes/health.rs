//! Service health and readiness reporting.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Liveness plus model readiness (`GET /health`).
///
/// Always answers 200 while the process is up; `current_model` stays null
/// until a model has been designated, so probes can tell "running" apart
/// from "ready to generate".
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service status and model readiness", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let current = state.registry.current().await;
    let loaded_models = state
        .registry
        .available()
        .await
        .iter()
        .filter(|m| m.loaded)
        .count();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "device": state.config.device.to_string(),
        "current_model": current.map(|handle| handle.name.to_string()),
        "loaded_models": loaded_models,
    }))
}

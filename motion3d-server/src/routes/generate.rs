//! Generation submission and synchronous benchmarking.
//!
//! `POST /generate` accepts a still image and a driving video via
//! multipart/form-data, enqueues a generation task and returns its id
//! immediately; poll `GET /task/{id}` for progress and fetch the result via
//! `GET /download/{id}`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use motion3d_core::{ModelError, ModelKind};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::{BenchmarkResponse, GenerateResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate, benchmark),
    components(schemas(GenerateResponse, BenchmarkResponse))
)]
pub struct GenerateApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/benchmark", post(benchmark))
}

const DEFAULT_BENCHMARK_RUNS: u32 = 3;

/// Fields extracted from a generation/benchmark multipart body.
#[derive(Default)]
struct Submission {
    source_image: Option<Bytes>,
    driving_video: Option<Bytes>,
    model_name: Option<String>,
    deadline_seconds: Option<u64>,
    num_runs: Option<u32>,
}

impl Submission {
    async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut sub = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            ServerError::BadRequest(format!("failed to read multipart field: {e}"))
        })? {
            let name = field.name().unwrap_or("").to_owned();
            match name.as_str() {
                "source_image" => {
                    sub.source_image = Some(field.bytes().await.map_err(|e| {
                        ServerError::BadRequest(format!("failed to read source_image: {e}"))
                    })?)
                }
                "driving_video" => {
                    sub.driving_video = Some(field.bytes().await.map_err(|e| {
                        ServerError::BadRequest(format!("failed to read driving_video: {e}"))
                    })?)
                }
                "model_name" => sub.model_name = Some(text_field(field, "model_name").await?),
                "deadline_seconds" => {
                    let text = text_field(field, "deadline_seconds").await?;
                    sub.deadline_seconds = Some(text.parse().map_err(|_| {
                        ServerError::BadRequest(format!(
                            "deadline_seconds must be a positive integer, got '{text}'"
                        ))
                    })?)
                }
                "num_runs" => {
                    let text = text_field(field, "num_runs").await?;
                    sub.num_runs = Some(text.parse().map_err(|_| {
                        ServerError::BadRequest(format!(
                            "num_runs must be a positive integer, got '{text}'"
                        ))
                    })?)
                }
                other => debug!(field = other, "ignoring unknown multipart field"),
            }
        }
        Ok(sub)
    }

    fn payloads(&self) -> Result<(Bytes, Bytes), ServerError> {
        let source = self
            .source_image
            .clone()
            .ok_or_else(|| ServerError::BadRequest("missing field 'source_image'".into()))?;
        let driving = self
            .driving_video
            .clone()
            .ok_or_else(|| ServerError::BadRequest("missing field 'driving_video'".into()))?;
        Ok((source, driving))
    }
}

async fn text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("failed to read {name}: {e}")))
}

/// Pick the model for this request: an explicit name wins, otherwise the
/// service-wide current model.
async fn resolve_model(
    state: &AppState,
    requested: Option<String>,
) -> Result<ModelKind, ServerError> {
    match requested {
        Some(name) => name
            .parse()
            .map_err(|_| ServerError::Model(ModelError::UnknownVariant { name })),
        None => state
            .registry
            .current()
            .await
            .map(|handle| handle.name)
            .ok_or(ServerError::Model(ModelError::NoCurrentModel)),
    }
}

/// Submit a generation task (`POST /generate`).
///
/// Multipart fields: `source_image` (required), `driving_video` (required),
/// `model_name` (optional, defaults to the current model),
/// `deadline_seconds` (optional).
#[utoipa::path(
    post,
    path = "/generate",
    tag = "generate",
    responses(
        (status = 202, description = "Task accepted", body = GenerateResponse),
        (status = 400, description = "Invalid payload or unknown model name"),
        (status = 503, description = "No model available or queue saturated"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GenerateResponse>), ServerError> {
    let sub = Submission::read(multipart).await?;
    let (source, driving) = sub.payloads()?;
    let model = resolve_model(&state, sub.model_name).await?;
    let deadline = sub.deadline_seconds.map(Duration::from_secs);

    let task_id = state
        .orchestrator
        .submit(source, driving, model, deadline)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(GenerateResponse { task_id })))
}

/// Run the model repeatedly over one input pair and report timing statistics
/// (`POST /benchmark`). Synchronous; creates no task.
///
/// Multipart fields: `source_image`, `driving_video`, `model_name`
/// (optional), `num_runs` (optional, default 3).
#[utoipa::path(
    post,
    path = "/benchmark",
    tag = "generate",
    responses(
        (status = 200, description = "Benchmark finished", body = BenchmarkResponse),
        (status = 400, description = "Invalid payload or parameters"),
        (status = 404, description = "Model checkpoint not available"),
        (status = 503, description = "No model available"),
    )
)]
pub async fn benchmark(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<BenchmarkResponse>, ServerError> {
    let sub = Submission::read(multipart).await?;
    let (source, driving) = sub.payloads()?;
    let model = resolve_model(&state, sub.model_name).await?;
    let num_runs = sub.num_runs.unwrap_or(DEFAULT_BENCHMARK_RUNS);

    let report = state
        .orchestrator
        .benchmark(source, driving, model, num_runs)
        .await?;
    Ok(Json(report.into()))
}

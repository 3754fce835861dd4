//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - A body-size limit sized from `MOTION3D_MAX_UPLOAD_SIZE_MB`
//! - Optional Swagger UI / OpenAPI spec endpoint
//!   (disable with `MOTION3D_ENABLE_SWAGGER=false`)

pub mod doc;
mod generate;
mod health;
mod models;
mod tasks;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(generate::router())
        .merge(tasks::router())
        .merge(models::router());

    // Enabled by default; disable in production to avoid exposing the API
    // structure to potential attackers.
    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(DefaultBodyLimit::max(
        state.config.max_upload_size_mb * 1024 * 1024,
    ))
    // Outermost layers execute first on the way in.
    .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
    .layer(middleware::from_fn(trace::trace_middleware))
    .with_state(state)
}

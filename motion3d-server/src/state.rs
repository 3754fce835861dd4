//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use motion3d_core::{GenerationOrchestrator, ModelRegistry, TaskStore};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Model lifecycle manager.
    pub registry: Arc<ModelRegistry>,
    /// Task records.
    pub store: TaskStore,
    /// The generation engine.
    pub orchestrator: Arc<GenerationOrchestrator>,
}

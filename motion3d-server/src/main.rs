//! motion3d-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Create the upload/result work directories.
//! 4. Build the model registry and pre-load the default model.
//! 5. Start the generation orchestrator and (optionally) the retention
//!    sweeper.
//! 6. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use motion3d_core::media::FfmpegCodec;
use motion3d_core::task::{spawn_sweeper, RetentionPolicy};
use motion3d_core::{
    GenerationOrchestrator, ModelKind, ModelRegistry, OrchestratorConfig, TaskStore, WorkDirs,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: MOTION3D_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "motion3d-server starting");

    // ── 3. Work directories ────────────────────────────────────────────────────
    let dirs = WorkDirs::create(&cfg.data_dir)?;
    info!(data_dir = %cfg.data_dir, "work directories ready");

    // ── 4. Model registry + default model ──────────────────────────────────────
    let registry = Arc::new(ModelRegistry::new(&cfg.models_dir, cfg.device));
    match cfg.default_model.parse::<ModelKind>() {
        Ok(kind) => {
            if let Err(e) = registry.set_current(kind).await {
                warn!(model = %kind, error = %e, "default model unavailable; continuing without a current model");
            }
        }
        Err(_) => warn!(
            name = %cfg.default_model,
            "MOTION3D_DEFAULT_MODEL is not a known variant; continuing without a current model"
        ),
    }

    // ── 5. Orchestrator + retention ────────────────────────────────────────────
    let store = TaskStore::new();
    let orchestrator = GenerationOrchestrator::start(
        Arc::clone(&registry),
        store.clone(),
        dirs,
        Arc::new(FfmpegCodec),
        OrchestratorConfig {
            queue_capacity: cfg.queue_capacity,
            worker_concurrency: cfg.worker_concurrency,
            max_frames: cfg.max_frames,
            output_fps: cfg.output_fps,
        },
    );
    info!(
        queue_capacity = cfg.queue_capacity,
        worker_concurrency = cfg.worker_concurrency,
        "generation orchestrator running"
    );

    if let Some(ttl_secs) = cfg.task_ttl_secs {
        spawn_sweeper(
            store.clone(),
            RetentionPolicy::new(Duration::from_secs(ttl_secs)),
        );
    }

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        registry,
        store,
        orchestrator,
    });

    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("motion3d-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

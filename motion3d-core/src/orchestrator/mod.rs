//! The async generation engine.
//!
//! Submission is decoupled from execution: `submit` validates, persists
//! inputs and enqueues a job onto a bounded channel, returning immediately.
//! A dispatch loop drains the channel, admitting workers through a semaphore
//! so at most `worker_concurrency` generations run at once. Workers write
//! every state change through the terminal-refusing task store, so a deadline
//! watchdog and a finishing worker can race freely; whichever writes the
//! terminal state first wins.

mod files;

pub use files::WorkDirs;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::media::{probe, MediaCodec, MediaError};
use crate::model::{ModelError, ModelKind, ModelRegistry};
use crate::task::{InputPaths, TaskError, TaskId, TaskStore};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The submission payloads failed validation.
    #[error("invalid submission: {0}")]
    Validation(String),

    /// The bounded job queue is saturated.
    #[error("generation queue is full")]
    QueueFull,

    /// The dispatch loop is gone; no new work can be accepted.
    #[error("orchestrator is shut down")]
    Shutdown,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("background task failed: {0}")]
    Background(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Bound of the submission queue.
    pub queue_capacity: usize,
    /// Maximum concurrently running generations.
    pub worker_concurrency: usize,
    /// Cap on extracted driving frames per task.
    pub max_frames: usize,
    /// Frame rate of encoded outputs.
    pub output_fps: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            worker_concurrency: 2,
            max_frames: crate::media::DEFAULT_MAX_FRAMES,
            output_fps: crate::media::DEFAULT_FPS,
        }
    }
}

/// Timing statistics from repeated forward passes over one input pair.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub model_name: ModelKind,
    pub num_runs: u32,
    pub frame_count: usize,
    pub avg_time_seconds: f64,
    pub min_time_seconds: f64,
    pub max_time_seconds: f64,
    pub fps: f64,
}

struct Job {
    task_id: TaskId,
    model_name: ModelKind,
    inputs: InputPaths,
}

/// Everything a worker needs, cloned per job.
#[derive(Clone)]
struct WorkerCtx {
    registry: Arc<ModelRegistry>,
    store: TaskStore,
    dirs: WorkDirs,
    codec: Arc<dyn MediaCodec>,
    config: OrchestratorConfig,
    /// Deadline watchdog handles, keyed by task id so a finished task can
    /// cancel its timer instead of letting it sleep out the full deadline.
    watchdogs: Arc<Mutex<HashMap<TaskId, AbortHandle>>>,
}

impl WorkerCtx {
    /// Cancel and drop the deadline watchdog for `id`, if one is still armed.
    fn disarm_watchdog(&self, id: TaskId) {
        if let Ok(mut map) = self.watchdogs.lock() {
            if let Some(handle) = map.remove(&id) {
                handle.abort();
            }
        }
    }
}

pub struct GenerationOrchestrator {
    ctx: WorkerCtx,
    tx: mpsc::Sender<Job>,
}

impl GenerationOrchestrator {
    /// Wire up the engine and spawn its dispatch loop.
    pub fn start(
        registry: Arc<ModelRegistry>,
        store: TaskStore,
        dirs: WorkDirs,
        codec: Arc<dyn MediaCodec>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let ctx = WorkerCtx {
            registry,
            store,
            dirs,
            codec,
            config,
            watchdogs: Arc::new(Mutex::new(HashMap::new())),
        };

        let loop_ctx = ctx.clone();
        let semaphore = Arc::new(Semaphore::new(config.worker_concurrency.max(1)));
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let ctx = loop_ctx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_job(ctx, job).await;
                });
            }
            debug!("generation dispatch loop stopped");
        });

        Arc::new(Self { ctx, tx })
    }

    /// Validate, persist and enqueue a generation request.
    ///
    /// Never blocks on inference; a saturated queue is reported as
    /// [`OrchestratorError::QueueFull`] with the partially created task and
    /// its files rolled back.
    pub async fn submit(
        &self,
        source: Bytes,
        driving: Bytes,
        model_name: ModelKind,
        deadline: Option<Duration>,
    ) -> Result<TaskId, OrchestratorError> {
        let source_ext = probe::image_extension(&source).ok_or_else(|| {
            OrchestratorError::Validation("source payload is not a recognizable image".into())
        })?;
        let driving_ext = probe::video_extension(&driving).ok_or_else(|| {
            OrchestratorError::Validation("driving payload is not a recognizable video".into())
        })?;

        let task = self.ctx.store.create(model_name).await;
        let inputs = match self
            .ctx
            .dirs
            .persist_inputs(task.id, &source, source_ext, &driving, driving_ext)
            .await
        {
            Ok(paths) => paths,
            Err(err) => {
                let _ = self.ctx.store.remove(task.id).await;
                return Err(err.into());
            }
        };
        let recorded = inputs.clone();
        self.ctx
            .store
            .update(task.id, move |t| t.input_paths = Some(recorded))
            .await?;

        let job = Job {
            task_id: task.id,
            model_name,
            inputs: inputs.clone(),
        };
        if let Err(err) = self.tx.try_send(job) {
            self.ctx.dirs.discard_inputs(&inputs).await;
            let _ = self.ctx.store.remove(task.id).await;
            return Err(match err {
                mpsc::error::TrySendError::Full(_) => OrchestratorError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => OrchestratorError::Shutdown,
            });
        }

        if let Some(deadline) = deadline {
            let store = self.ctx.store.clone();
            let watchdogs = Arc::clone(&self.ctx.watchdogs);
            let id = task.id;
            let watchdog = tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                if let Ok(mut map) = watchdogs.lock() {
                    map.remove(&id);
                }
                let detail =
                    format!("deadline exceeded after {:.1}s", deadline.as_secs_f64());
                if store.update(id, |t| t.fail(detail)).await.is_ok() {
                    warn!(task_id = %id, "task deadline exceeded");
                }
            });
            if let Ok(mut map) = self.ctx.watchdogs.lock() {
                map.insert(task.id, watchdog.abort_handle());
            }
        }

        info!(task_id = %task.id, model = %model_name, "generation task queued");
        Ok(task.id)
    }

    /// Remove a task record and every file it owns.
    pub async fn cleanup(&self, id: TaskId) -> Result<(), TaskError> {
        let task = self.ctx.store.remove(id).await?;
        self.ctx.disarm_watchdog(id);
        self.ctx.dirs.discard_task_files(&task).await;
        info!(task_id = %id, "task cleaned up");
        Ok(())
    }

    /// Decode once, run `forward` repeatedly, report timing statistics.
    /// Creates no task and touches no files.
    pub async fn benchmark(
        &self,
        source: Bytes,
        driving: Bytes,
        model_name: ModelKind,
        num_runs: u32,
    ) -> Result<BenchmarkReport, OrchestratorError> {
        if num_runs == 0 {
            return Err(OrchestratorError::Validation(
                "num_runs must be at least 1".into(),
            ));
        }

        let codec = Arc::clone(&self.ctx.codec);
        let max_frames = self.ctx.config.max_frames;
        let (source_frame, driving_frames) = tokio::task::spawn_blocking(move || {
            let s = codec.decode_image(&source)?;
            let d = codec.decode_video(&driving, max_frames)?;
            Ok::<_, MediaError>((s, d))
        })
        .await
        .map_err(|e| OrchestratorError::Background(e.to_string()))??;

        let capability = self.ctx.registry.load(model_name).await?.capability();
        let frame_count = driving_frames.len();

        let timings = tokio::task::spawn_blocking(move || {
            let mut timings = Vec::with_capacity(num_runs as usize);
            for _ in 0..num_runs {
                let started = Instant::now();
                capability.forward(&source_frame, &driving_frames)?;
                timings.push(started.elapsed().as_secs_f64());
            }
            Ok::<_, ModelError>(timings)
        })
        .await
        .map_err(|e| OrchestratorError::Background(e.to_string()))??;

        let avg = timings.iter().sum::<f64>() / timings.len() as f64;
        let min = timings.iter().copied().fold(f64::INFINITY, f64::min);
        let max = timings.iter().copied().fold(0.0_f64, f64::max);
        Ok(BenchmarkReport {
            model_name,
            num_runs,
            frame_count,
            avg_time_seconds: avg,
            min_time_seconds: min,
            max_time_seconds: max,
            fps: if avg > 0.0 {
                frame_count as f64 / avg
            } else {
                0.0
            },
        })
    }
}

/// A worker stage either advances the task or stops.
enum StageAbort {
    /// The task went terminal under us (deadline or delete); stop silently.
    Superseded,
    /// The stage itself failed; mark the task Failed with this detail.
    Failed(String),
}

async fn run_job(ctx: WorkerCtx, job: Job) {
    let id = job.task_id;
    match execute(&ctx, &job).await {
        Ok(()) => info!(task_id = %id, "generation completed"),
        Err(StageAbort::Superseded) => {
            debug!(task_id = %id, "worker result discarded, task already terminal")
        }
        Err(StageAbort::Failed(detail)) => {
            // Inputs are deliberately left behind for diagnosis.
            error!(task_id = %id, detail = %detail, "generation failed");
            let _ = ctx.store.update(id, |t| t.fail(detail.clone())).await;
        }
    }
    // The task is terminal either way; its deadline timer has nothing left
    // to guard.
    ctx.disarm_watchdog(id);
}

async fn execute(ctx: &WorkerCtx, job: &Job) -> Result<(), StageAbort> {
    let id = job.task_id;
    progress(&ctx.store, id, 0).await?;

    let source_bytes = tokio::fs::read(&job.inputs.source)
        .await
        .map_err(|e| StageAbort::Failed(format!("failed to read source image: {e}")))?;
    let driving_bytes = tokio::fs::read(&job.inputs.driving)
        .await
        .map_err(|e| StageAbort::Failed(format!("failed to read driving video: {e}")))?;

    let codec = Arc::clone(&ctx.codec);
    let max_frames = ctx.config.max_frames;
    let (source, driving) = tokio::task::spawn_blocking(move || {
        let source = codec.decode_image(&source_bytes)?;
        let driving = codec.decode_video(&driving_bytes, max_frames)?;
        Ok::<_, MediaError>((source, driving))
    })
    .await
    .map_err(join_failure)?
    .map_err(|e| StageAbort::Failed(e.to_string()))?;
    progress(&ctx.store, id, 25).await?;

    // Resolved per invocation, just before the call; a concurrent switch of
    // the service-wide current model never reroutes a task mid-flight.
    let capability = ctx
        .registry
        .load(job.model_name)
        .await
        .map_err(|e| StageAbort::Failed(e.to_string()))?
        .capability();
    progress(&ctx.store, id, 50).await?;

    let driving_len = driving.len();
    let frames = tokio::task::spawn_blocking(move || capability.forward(&source, &driving))
        .await
        .map_err(join_failure)?
        .map_err(|e| StageAbort::Failed(e.to_string()))?;
    if frames.len() != driving_len {
        return Err(StageAbort::Failed(format!(
            "model produced {} frames for {driving_len} driving frames",
            frames.len()
        )));
    }

    let codec = Arc::clone(&ctx.codec);
    let fps = ctx.config.output_fps;
    let encoded = tokio::task::spawn_blocking(move || codec.encode_video(&frames, fps))
        .await
        .map_err(join_failure)?
        .map_err(|e| StageAbort::Failed(e.to_string()))?;
    progress(&ctx.store, id, 75).await?;

    let output = ctx
        .dirs
        .finalize_output(id, &encoded)
        .await
        .map_err(|e| StageAbort::Failed(format!("failed to persist output: {e}")))?;
    ctx.dirs.discard_inputs(&job.inputs).await;

    // The terminal write is last; if a deadline beat us here, drop the
    // orphaned output instead of resurrecting the task.
    if ctx
        .store
        .update(id, move |t| t.complete(output.clone()))
        .await
        .is_err()
    {
        let _ = tokio::fs::remove_file(ctx.dirs.output_path(id)).await;
        return Err(StageAbort::Superseded);
    }
    Ok(())
}

async fn progress(store: &TaskStore, id: TaskId, pct: u8) -> Result<(), StageAbort> {
    store
        .update(id, move |t| t.set_progress(pct))
        .await
        .map(|_| ())
        .map_err(|_| StageAbort::Superseded)
}

fn join_failure(err: tokio::task::JoinError) -> StageAbort {
    StageAbort::Failed(format!("background task failed: {err}"))
}

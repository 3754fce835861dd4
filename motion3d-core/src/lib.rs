//! Orchestration core for the motion transfer service.
//!
//! The actual neural inference is treated as a swappable capability behind
//! the [`model::MotionModel`] trait; this crate provides everything around
//! it:
//!
//! - [`media`] – deterministic conversion between raw image/video bytes and
//!   fixed-shape normalized frame buffers.
//! - [`model`] – lifecycle and identity management for loaded model
//!   instances (cache, current-model designation, eviction).
//! - [`task`] – concurrency-safe task records and their state machine.
//! - [`orchestrator`] – the async engine wiring the three together per
//!   generation request, off the request path, with bounded concurrency.

pub mod media;
pub mod model;
pub mod orchestrator;
pub mod task;

pub use media::{Frame, FrameSequence, MediaError};
pub use model::{Device, ModelError, ModelHandle, ModelKind, ModelRegistry};
pub use orchestrator::{
    BenchmarkReport, GenerationOrchestrator, OrchestratorConfig, OrchestratorError, WorkDirs,
};
pub use task::{Task, TaskError, TaskId, TaskStatus, TaskStore};

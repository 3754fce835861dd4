//! Concurrency-safe task records and their state machine.

mod retention;
mod store;
mod types;

pub use retention::{spawn_sweeper, RetentionPolicy};
pub use store::TaskStore;
pub use types::{InputPaths, Task, TaskError, TaskId, TaskStatus};

//! Upload/result file lifecycle for generation tasks.

use std::path::PathBuf;

use tracing::debug;

use crate::task::{InputPaths, TaskId};

/// Roots for persisted inputs and finalized outputs.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    uploads: PathBuf,
    results: PathBuf,
}

impl WorkDirs {
    /// Create both directories under `data_dir` (idempotent).
    pub fn create(data_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let data_dir = data_dir.into();
        let dirs = Self {
            uploads: data_dir.join("uploads"),
            results: data_dir.join("results"),
        };
        std::fs::create_dir_all(&dirs.uploads)?;
        std::fs::create_dir_all(&dirs.results)?;
        Ok(dirs)
    }

    /// Write both payloads under the uploads root, named by task id.
    pub async fn persist_inputs(
        &self,
        id: TaskId,
        source: &[u8],
        source_ext: &str,
        driving: &[u8],
        driving_ext: &str,
    ) -> std::io::Result<InputPaths> {
        let paths = InputPaths {
            source: self.uploads.join(format!("{id}_source.{source_ext}")),
            driving: self.uploads.join(format!("{id}_driving.{driving_ext}")),
        };
        tokio::fs::write(&paths.source, source).await?;
        tokio::fs::write(&paths.driving, driving).await?;
        Ok(paths)
    }

    pub fn output_path(&self, id: TaskId) -> PathBuf {
        self.results.join(format!("{id}.mp4"))
    }

    /// Persist the encoded output: temp-file write, then atomic rename, so a
    /// Completed task never points at a partially written file.
    pub async fn finalize_output(&self, id: TaskId, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let final_path = self.output_path(id);
        let part_path = self.results.join(format!("{id}.mp4.part"));
        tokio::fs::write(&part_path, bytes).await?;
        tokio::fs::rename(&part_path, &final_path).await?;
        Ok(final_path)
    }

    /// Best-effort removal of consumed inputs.
    pub async fn discard_inputs(&self, paths: &InputPaths) {
        for path in [&paths.source, &paths.driving] {
            if let Err(err) = tokio::fs::remove_file(path).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %path.display(), %err, "failed to remove input file");
                }
            }
        }
    }

    /// Best-effort removal of every file a task record points at.
    pub async fn discard_task_files(&self, task: &crate::task::Task) {
        if let Some(inputs) = &task.input_paths {
            self.discard_inputs(inputs).await;
        }
        if let Some(output) = &task.output_path {
            if let Err(err) = tokio::fs::remove_file(output).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %output.display(), %err, "failed to remove output file");
                }
            }
        }
    }
}

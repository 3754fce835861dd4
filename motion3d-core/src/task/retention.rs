//! Optional TTL-based cleanup of terminal tasks.
//!
//! A scheduled concern layered on top of the store, wired in by whoever owns
//! the runtime. Requests never trigger sweeps.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::TaskStore;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// How long a terminal task is kept after its last update.
    pub ttl: Duration,
    /// How often the sweeper wakes up.
    pub sweep_interval: Duration,
}

impl RetentionPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Spawn the background sweeper. Runs until the handle is aborted.
///
/// Each sweep removes terminal tasks whose last update is older than the TTL
/// and deletes their files (output, plus any inputs left behind by a failed
/// run).
pub fn spawn_sweeper(store: TaskStore, policy: RetentionPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            ttl_secs = policy.ttl.as_secs(),
            interval_secs = policy.sweep_interval.as_secs(),
            "task retention sweeper started"
        );
        let mut tick = tokio::time::interval(policy.sweep_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            sweep_once(&store, policy.ttl).await;
        }
    })
}

async fn sweep_once(store: &TaskStore, ttl: Duration) {
    let cutoff = chrono::Utc::now()
        - chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());

    let expired: Vec<_> = store
        .list()
        .await
        .into_iter()
        .filter(|t| t.status.is_terminal() && t.updated_at < cutoff)
        .map(|t| t.id)
        .collect();

    for id in expired {
        match store.remove(id).await {
            Ok(task) => {
                debug!(task_id = %id, "expired task swept");
                let mut paths = Vec::new();
                if let Some(out) = task.output_path {
                    paths.push(out);
                }
                if let Some(inputs) = task.input_paths {
                    paths.push(inputs.source);
                    paths.push(inputs.driving);
                }
                for path in paths {
                    if let Err(err) = tokio::fs::remove_file(&path).await {
                        if err.kind() != std::io::ErrorKind::NotFound {
                            warn!(path = %path.display(), %err, "failed to delete swept file");
                        }
                    }
                }
            }
            // Raced with an explicit delete; nothing to do.
            Err(_) => continue,
        }
    }
}

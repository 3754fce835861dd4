//! Lifecycle and identity management for loaded model instances.
//!
//! The registry is an explicitly constructed instance passed by `Arc` to
//! whoever needs it, never a process-wide global, so tests can wire fake
//! model directories without cross-test interference.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::model::capability::{build_capability, Checkpoint};
use crate::model::{Device, ModelError, ModelKind, MotionModel};

/// A loaded, ready-to-run model instance.
pub struct ModelHandle {
    pub name: ModelKind,
    pub device: Device,
    capability: Arc<dyn MotionModel>,
}

impl ModelHandle {
    /// The inference capability, cloned out so no registry lock is held
    /// while it runs.
    pub fn capability(&self) -> Arc<dyn MotionModel> {
        Arc::clone(&self.capability)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("device", &self.device)
            .finish()
    }
}

/// Availability report for one model variant.
#[derive(Debug, Clone, Serialize)]
pub struct ModelAvailability {
    pub name: ModelKind,
    pub device: String,
    pub available: bool,
    pub loaded: bool,
    pub current: bool,
}

#[derive(Default)]
struct RegistryState {
    cache: HashMap<ModelKind, Arc<ModelHandle>>,
    current: Option<ModelKind>,
}

/// Owns the cache of loaded handles and the single "current" designation.
///
/// Capacity note: switching `current` does not evict the previous handle, so
/// repeated switching between N variants bounds device memory by the sum of
/// all loaded handles, not one.  Memory is reclaimed only via [`Self::evict`].
pub struct ModelRegistry {
    models_dir: PathBuf,
    device: Device,
    inner: RwLock<RegistryState>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models_dir", &self.models_dir)
            .field("device", &self.device)
            .finish()
    }
}

impl ModelRegistry {
    pub fn new(models_dir: impl Into<PathBuf>, device: Device) -> Self {
        Self {
            models_dir: models_dir.into(),
            device,
            inner: RwLock::new(RegistryState::default()),
        }
    }

    fn checkpoint_path(&self, kind: ModelKind) -> PathBuf {
        self.models_dir
            .join(kind.to_string())
            .join(kind.checkpoint_file())
    }

    /// Load a model variant, idempotently.
    ///
    /// A cached handle is returned as-is (same `Arc` identity) without
    /// touching the checkpoint again; weight materialization happens outside
    /// any lock, and a concurrent load of the same name keeps the first
    /// materialized handle.
    pub async fn load(&self, kind: ModelKind) -> Result<Arc<ModelHandle>, ModelError> {
        {
            let state = self.inner.read().await;
            if let Some(handle) = state.cache.get(&kind) {
                return Ok(Arc::clone(handle));
            }
        }

        // Materialize outside the lock: load is expensive and must not stall
        // concurrent readers.
        let path = self.checkpoint_path(kind);
        let device = self.device;
        let weights =
            tokio::task::spawn_blocking(move || Checkpoint::load(kind, &path))
                .await
                .map_err(|e| ModelError::Load {
                    name: kind,
                    message: format!("checkpoint load task failed: {e}"),
                })??;

        let handle = Arc::new(ModelHandle {
            name: kind,
            device,
            capability: build_capability(kind, weights),
        });

        let mut state = self.inner.write().await;
        // A concurrent load may have won; keep the first handle so identity
        // stays stable.
        if let Some(existing) = state.cache.get(&kind) {
            return Ok(Arc::clone(existing));
        }
        state.cache.insert(kind, Arc::clone(&handle));
        info!(model = %kind, device = %self.device, "model loaded");
        Ok(handle)
    }

    /// Load if necessary, then atomically designate `kind` as current.
    ///
    /// The previous current handle stays cached for fast re-switch.
    pub async fn set_current(&self, kind: ModelKind) -> Result<Arc<ModelHandle>, ModelError> {
        let handle = self.load(kind).await?;
        let mut state = self.inner.write().await;
        state.current = Some(kind);
        info!(model = %kind, "current model set");
        Ok(handle)
    }

    /// The currently designated handle, if any.
    ///
    /// Always either `None` or a handle present in the cache; a concurrent
    /// switch is observed atomically.
    pub async fn current(&self) -> Option<Arc<ModelHandle>> {
        let state = self.inner.read().await;
        state
            .current
            .and_then(|kind| state.cache.get(&kind))
            .map(Arc::clone)
    }

    /// Release a handle and its weights.  No-op on a non-loaded name; clears
    /// `current` if it pointed at `kind`.
    pub async fn evict(&self, kind: ModelKind) {
        let mut state = self.inner.write().await;
        if state.cache.remove(&kind).is_some() {
            info!(model = %kind, "model evicted");
        }
        if state.current == Some(kind) {
            state.current = None;
        }
    }

    /// Report every known variant with on-disk and cache status.
    pub async fn available(&self) -> Vec<ModelAvailability> {
        let state = self.inner.read().await;
        ModelKind::ALL
            .iter()
            .map(|&kind| ModelAvailability {
                name: kind,
                device: self.device.to_string(),
                available: self.checkpoint_path(kind).exists(),
                loaded: state.cache.contains_key(&kind),
                current: state.current == Some(kind),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_models_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("m3d-models-{}", uuid::Uuid::new_v4()));
        for kind in ModelKind::ALL {
            Checkpoint::default()
                .write(&dir.join(kind.to_string()).join(kind.checkpoint_file()))
                .unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn load_is_idempotent_and_identity_stable() {
        let dir = temp_models_dir();
        let registry = ModelRegistry::new(&dir, Device::Cpu);

        let first = registry.load(ModelKind::MotionClone).await.unwrap();
        let second = registry.load(ModelKind::MotionClone).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn load_missing_checkpoint_is_not_found() {
        let dir = std::env::temp_dir().join(format!("m3d-empty-{}", uuid::Uuid::new_v4()));
        let registry = ModelRegistry::new(&dir, Device::Cpu);
        let err = registry.load(ModelKind::Fomm).await.unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    #[tokio::test]
    async fn set_current_keeps_previous_handle_cached() {
        let dir = temp_models_dir();
        let registry = ModelRegistry::new(&dir, Device::Cpu);

        let clone_handle = registry.set_current(ModelKind::MotionClone).await.unwrap();
        registry.set_current(ModelKind::Fomm).await.unwrap();

        let current = registry.current().await.unwrap();
        assert_eq!(current.name, ModelKind::Fomm);

        // Re-switch returns the cached handle, not a reload.
        let back = registry.set_current(ModelKind::MotionClone).await.unwrap();
        assert!(Arc::ptr_eq(&clone_handle, &back));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn failed_switch_leaves_current_unchanged() {
        let dir = temp_models_dir();
        // Only motion_clone is materializable.
        std::fs::remove_dir_all(dir.join(ModelKind::Fomm.to_string())).unwrap();
        let registry = ModelRegistry::new(&dir, Device::Cpu);

        registry.set_current(ModelKind::MotionClone).await.unwrap();
        assert!(registry.set_current(ModelKind::Fomm).await.is_err());
        assert_eq!(
            registry.current().await.unwrap().name,
            ModelKind::MotionClone
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn evict_clears_current_and_is_noop_on_unknown() {
        let dir = temp_models_dir();
        let registry = ModelRegistry::new(&dir, Device::Cpu);

        registry.set_current(ModelKind::Fomm).await.unwrap();
        registry.evict(ModelKind::Fomm).await;
        assert!(registry.current().await.is_none());

        // Not loaded: no-op.
        registry.evict(ModelKind::MotionClone).await;

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn concurrent_switching_yields_one_observable_current() {
        let dir = temp_models_dir();
        let registry = Arc::new(ModelRegistry::new(&dir, Device::Cpu));

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            let kind = if i % 2 == 0 {
                ModelKind::MotionClone
            } else {
                ModelKind::Fomm
            };
            handles.push(tokio::spawn(async move {
                registry.set_current(kind).await.unwrap();
                registry.current().await
            }));
        }
        for h in handles {
            // Every observation is a single cached handle, never a torn state.
            let observed = h.await.unwrap().unwrap();
            assert!(ModelKind::ALL.contains(&observed.name));
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn availability_reflects_disk_and_cache() {
        let dir = temp_models_dir();
        let registry = ModelRegistry::new(&dir, Device::Cpu);
        registry.set_current(ModelKind::MotionClone).await.unwrap();

        let report = registry.available().await;
        let clone = report
            .iter()
            .find(|m| m.name == ModelKind::MotionClone)
            .unwrap();
        assert!(clone.available && clone.loaded && clone.current);
        let fomm = report.iter().find(|m| m.name == ModelKind::Fomm).unwrap();
        assert!(fomm.available && !fomm.loaded && !fomm.current);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

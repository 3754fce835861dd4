//! The inference capability interface and its tagged variants.
//!
//! Variants implement one trait and are selected by name through the
//! registry; callers never branch on the concrete type.  The numerical
//! internals of real motion-transfer networks live behind this seam and are
//! out of scope here; the shipped variants apply deterministic
//! motion-field arithmetic parameterized by checkpoint weights, which is
//! enough to exercise every pipeline contract (shape, range, frame count).

use std::path::Path;

use crate::media::{Frame, FrameSequence};
use crate::model::{ModelError, ModelKind};

/// A loaded, runnable motion-transfer capability.
///
/// Implementations must be safe for concurrent invocation: `forward` takes
/// `&self` and multiple tasks may call it on one handle at once.  A variant
/// that cannot satisfy this must synchronize internally; the orchestrator
/// never wraps handles in a hidden lock.
pub trait MotionModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Apply the motion of `driving` to `source`.
    ///
    /// The output sequence must contain exactly `driving.len()` frames of
    /// the pipeline shape, normalized to the declared range.
    fn forward(&self, source: &Frame, driving: &[Frame]) -> Result<FrameSequence, ModelError>;
}

// ── Checkpoint format ────────────────────────────────────────────────────────

const CHECKPOINT_MAGIC: &[u8; 4] = b"M3DC";
const CHECKPOINT_LEN: usize = 4 + 1 + 4 + 4; // magic + version + two f32 params

/// Materialized checkpoint weights shared by the shipped variants.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    /// Gain applied to the motion field extracted from the driving sequence.
    pub motion_scale: f32,
    /// Blend weight of the source identity in each output frame.
    pub identity_weight: f32,
}

impl Checkpoint {
    /// Read and validate a checkpoint file.
    ///
    /// A missing file is [`ModelError::NotFound`]; a present but malformed
    /// file is [`ModelError::Load`].
    pub fn load(kind: ModelKind, path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound {
                name: kind,
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path).map_err(|e| ModelError::Load {
            name: kind,
            message: e.to_string(),
        })?;
        Self::parse(&bytes).map_err(|message| ModelError::Load {
            name: kind,
            message,
        })
    }

    fn parse(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < CHECKPOINT_LEN {
            return Err(format!(
                "checkpoint truncated ({} bytes, expected at least {CHECKPOINT_LEN})",
                bytes.len()
            ));
        }
        if &bytes[0..4] != CHECKPOINT_MAGIC {
            return Err("bad checkpoint magic".into());
        }
        let version = bytes[4];
        if version != 1 {
            return Err(format!("unsupported checkpoint version {version}"));
        }
        let motion_scale = f32::from_le_bytes(bytes[5..9].try_into().unwrap());
        let identity_weight = f32::from_le_bytes(bytes[9..13].try_into().unwrap());
        if !motion_scale.is_finite() || !identity_weight.is_finite() {
            return Err("checkpoint parameters are not finite".into());
        }
        Ok(Self {
            motion_scale,
            identity_weight,
        })
    }

    /// Write a checkpoint file; provisioning/test helper.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut bytes = Vec::with_capacity(CHECKPOINT_LEN);
        bytes.extend_from_slice(CHECKPOINT_MAGIC);
        bytes.push(1);
        bytes.extend_from_slice(&self.motion_scale.to_le_bytes());
        bytes.extend_from_slice(&self.identity_weight.to_le_bytes());
        std::fs::write(path, bytes)
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            motion_scale: 1.0,
            identity_weight: 0.8,
        }
    }
}

// ── Variants ─────────────────────────────────────────────────────────────────

/// Motion-cloning variant: transplants the per-frame motion field (the delta
/// against the first driving frame) onto the source identity.
#[derive(Debug)]
pub struct MotionClone {
    weights: Checkpoint,
}

impl MotionClone {
    pub fn new(weights: Checkpoint) -> Self {
        Self { weights }
    }
}

impl MotionModel for MotionClone {
    fn kind(&self) -> ModelKind {
        ModelKind::MotionClone
    }

    fn forward(&self, source: &Frame, driving: &[Frame]) -> Result<FrameSequence, ModelError> {
        let anchor = driving.first().ok_or_else(|| ModelError::Inference {
            name: self.kind(),
            message: "driving sequence is empty".into(),
        })?;

        let out = driving
            .iter()
            .map(|frame| {
                let samples = source
                    .samples()
                    .iter()
                    .zip(frame.samples().iter().zip(anchor.samples()))
                    .map(|(&s, (&d, &a))| {
                        (s + self.weights.motion_scale * (d - a)).clamp(-1.0, 1.0)
                    })
                    .collect();
                Frame::from_samples(samples)
            })
            .collect();
        Ok(out)
    }
}

/// First-order variant: blends the source identity with each driving frame
/// in addition to the relative motion term.
#[derive(Debug)]
pub struct Fomm {
    weights: Checkpoint,
}

impl Fomm {
    pub fn new(weights: Checkpoint) -> Self {
        Self { weights }
    }
}

impl MotionModel for Fomm {
    fn kind(&self) -> ModelKind {
        ModelKind::Fomm
    }

    fn forward(&self, source: &Frame, driving: &[Frame]) -> Result<FrameSequence, ModelError> {
        let anchor = driving.first().ok_or_else(|| ModelError::Inference {
            name: self.kind(),
            message: "driving sequence is empty".into(),
        })?;

        let w = self.weights.identity_weight.clamp(0.0, 1.0);
        let out = driving
            .iter()
            .map(|frame| {
                let samples = source
                    .samples()
                    .iter()
                    .zip(frame.samples().iter().zip(anchor.samples()))
                    .map(|(&s, (&d, &a))| {
                        let motion = self.weights.motion_scale * (d - a);
                        (w * s + (1.0 - w) * d + motion).clamp(-1.0, 1.0)
                    })
                    .collect();
                Frame::from_samples(samples)
            })
            .collect();
        Ok(out)
    }
}

/// Instantiate the variant for `kind` from its checkpoint weights.
pub(crate) fn build_capability(
    kind: ModelKind,
    weights: Checkpoint,
) -> std::sync::Arc<dyn MotionModel> {
    match kind {
        ModelKind::MotionClone => std::sync::Arc::new(MotionClone::new(weights)),
        ModelKind::Fomm => std::sync::Arc::new(Fomm::new(weights)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(value: f32) -> Frame {
        Frame::from_samples(vec![value; Frame::LEN])
    }

    #[test]
    fn checkpoint_roundtrip() {
        let dir = std::env::temp_dir().join(format!("m3d-ckpt-{}", uuid::Uuid::new_v4()));
        let path = dir.join("checkpoint.bin");
        let ckpt = Checkpoint {
            motion_scale: 0.5,
            identity_weight: 0.9,
        };
        ckpt.write(&path).unwrap();
        let loaded = Checkpoint::load(ModelKind::MotionClone, &path).unwrap();
        assert_eq!(loaded.motion_scale, 0.5);
        assert_eq!(loaded.identity_weight, 0.9);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_checkpoint_is_not_found() {
        let path = std::env::temp_dir().join(format!("m3d-missing-{}", uuid::Uuid::new_v4()));
        let err = Checkpoint::load(ModelKind::Fomm, &path).unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    #[test]
    fn malformed_checkpoint_is_load_error() {
        let path = std::env::temp_dir().join(format!("m3d-bad-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"XXXX\x01junkjunk").unwrap();
        let err = Checkpoint::load(ModelKind::MotionClone, &path).unwrap_err();
        assert!(matches!(err, ModelError::Load { .. }));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn forward_preserves_driving_frame_count() {
        let model = MotionClone::new(Checkpoint::default());
        let source = flat_frame(0.0);
        let driving = vec![flat_frame(-0.2), flat_frame(0.0), flat_frame(0.2)];
        let out = model.forward(&source, &driving).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn forward_output_stays_in_declared_range() {
        for capability in [
            build_capability(ModelKind::MotionClone, Checkpoint::default()),
            build_capability(ModelKind::Fomm, Checkpoint::default()),
        ] {
            let source = flat_frame(0.9);
            let driving = vec![flat_frame(-1.0), flat_frame(1.0)];
            let out = capability.forward(&source, &driving).unwrap();
            for frame in &out {
                assert!(frame.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
            }
        }
    }

    #[test]
    fn empty_driving_sequence_is_inference_error() {
        let model = Fomm::new(Checkpoint::default());
        let err = model.forward(&flat_frame(0.0), &[]).unwrap_err();
        assert!(matches!(err, ModelError::Inference { .. }));
    }
}

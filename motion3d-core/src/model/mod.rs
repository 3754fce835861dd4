//! Model variants, devices and the lifecycle error taxonomy.

mod capability;
mod registry;

pub use capability::{Checkpoint, Fomm, MotionClone, MotionModel};
pub use registry::{ModelAvailability, ModelHandle, ModelRegistry};

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Known model variants, selected by name through the registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[strum(serialize = "motion_clone")]
    MotionClone,
    #[strum(serialize = "fomm")]
    Fomm,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::MotionClone, ModelKind::Fomm];

    /// Checkpoint file name under `<models_dir>/<name>/`.
    pub fn checkpoint_file(&self) -> &'static str {
        match self {
            ModelKind::MotionClone => "checkpoint.bin",
            ModelKind::Fomm => "vox-cpk.bin",
        }
    }
}

/// Compute target a model is placed on.  Carried on handles for reporting;
/// placement itself is the capability's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Accelerator(u32),
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator(idx) => write!(f, "accelerator:{idx}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("cpu") {
            return Ok(Device::Cpu);
        }
        if let Some(idx) = s.strip_prefix("accelerator:") {
            return idx
                .parse()
                .map(Device::Accelerator)
                .map_err(|_| format!("invalid accelerator index in '{s}'"));
        }
        Err(format!("unknown device '{s}' (expected 'cpu' or 'accelerator:N')"))
    }
}

/// Errors produced by the model lifecycle layer.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The name does not map to any known variant.
    #[error("unknown model variant: {name}")]
    UnknownVariant { name: String },

    /// No checkpoint resource exists for the variant.
    #[error("model '{name}' not found (expected checkpoint at {path})")]
    NotFound { name: ModelKind, path: PathBuf },

    /// The checkpoint resource exists but is malformed.
    #[error("failed to load model '{name}': {message}")]
    Load { name: ModelKind, message: String },

    /// The inference capability raised during execution.
    #[error("inference failed for model '{name}': {message}")]
    Inference { name: ModelKind, message: String },

    /// An operation needed a current model but none is designated.
    #[error("no model is currently loaded")]
    NoCurrentModel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_roundtrip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.to_string().parse::<ModelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        assert!("unknown".parse::<ModelKind>().is_err());
    }

    #[test]
    fn device_parses_and_displays() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!(
            "accelerator:0".parse::<Device>().unwrap(),
            Device::Accelerator(0)
        );
        assert_eq!(Device::Accelerator(1).to_string(), "accelerator:1");
        assert!("gpu".parse::<Device>().is_err());
    }
}

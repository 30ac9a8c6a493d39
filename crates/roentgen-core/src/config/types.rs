//! Sub-configuration structs with documented defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::{DEFAULT_NO_FINDING_LABEL, DEFAULT_THRESHOLD};

/// Checkpoint and device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the checkpoint file (`.safetensors`, or a torch pickle
    /// archive such as `.pth.tar`)
    pub checkpoint_path: PathBuf,

    /// Compute device: "auto", "cpu", "cuda", or "cuda:N"
    pub device: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("~/.roentgen/models/chexnet.safetensors"),
            device: "auto".to_string(),
        }
    }
}

/// Threshold and sentinel settings.
///
/// Both values are product-level choices, configurable rather than baked
/// in; the defaults match the behavior the classifier was deployed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Minimum confidence for a finding to appear in results
    pub threshold: f32,

    /// Label reported when no finding clears the threshold
    pub no_finding_label: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            no_finding_label: DEFAULT_NO_FINDING_LABEL.to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", or "error"
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

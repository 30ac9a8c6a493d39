//! Roentgen Core - chest radiograph multi-label classification.
//!
//! Roentgen takes a radiograph image and produces the set of diagnostic
//! findings whose confidence clears a threshold. Any number of the 14
//! findings (0–14) may be simultaneously present; each probability is
//! independent.
//!
//! # Architecture
//!
//! A pure inference pipeline with no serving dependencies:
//!
//! ```text
//! bytes → Decode → Preprocess [1,3,224,224] → DenseNet-121 → 14 probabilities → Threshold filter → Findings
//! ```
//!
//! The classifier is loaded once at startup from a checkpoint (key
//! normalization included) and shared for the process lifetime; forward
//! passes are serialized through the classifier handle.
//!
//! # Usage
//!
//! ```rust,ignore
//! use roentgen_core::{checkpoint, parse_device, Config, InferenceEngine};
//!
//! let config = Config::load()?;
//! let device = parse_device(&config.model.device)?;
//! let classifier = checkpoint::load(&config.checkpoint_path(), &device)?;
//! let engine = InferenceEngine::new(classifier, &config.inference);
//!
//! let result = engine.predict(&image_bytes)?;
//! println!("{}", result.summary());
//! ```

// Module declarations
pub mod checkpoint;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod types;

// Re-exports for convenient access
pub use checkpoint::BindingReport;
pub use config::Config;
pub use device::parse_device;
pub use engine::InferenceEngine;
pub use error::{
    ConfigError, ImageDecodeError, InferenceError, ModelLoadError, Result, RoentgenError,
};
pub use labels::{FINDING_LABELS, NUM_FINDINGS};
pub use model::{ChestClassifier, InferenceMode};
pub use types::{Finding, PredictionResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

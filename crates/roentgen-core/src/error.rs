//! Error types for the Roentgen inference core.
//!
//! Errors are organized by failure domain so the serving boundary can map
//! each one to the right user-facing outcome: `ModelLoadError` is fatal at
//! startup, while `ImageDecodeError` and `InferenceError` are per-request.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Roentgen operations.
#[derive(Error, Debug)]
pub enum RoentgenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Checkpoint loading failed (fatal, startup-time)
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    /// Input bytes could not be decoded as an image (per-request)
    #[error(transparent)]
    ImageDecode(#[from] ImageDecodeError),

    /// The classifier failed to execute (per-request, backend fault)
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Checkpoint loading failures. All variants are fatal: without a fully
/// bound classifier there is no valid service.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    /// Checkpoint file does not exist
    #[error("Checkpoint not found: {0}")]
    NotFound(PathBuf),

    /// Checkpoint file exists but could not be deserialized
    #[error("Failed to read checkpoint {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Building the classifier graph failed
    #[error("Failed to build classifier: {message}")]
    Architecture { message: String },

    /// A checkpoint tensor overlaps an architecture parameter by name but
    /// not by shape
    #[error("Shape mismatch for parameter '{name}': {message}")]
    ShapeMismatch { name: String, message: String },

    /// No checkpoint key matched any architecture parameter after key
    /// normalization
    #[error("Checkpoint {path} shares no parameters with the classifier")]
    NoOverlap { path: PathBuf },

    /// The requested compute device could not be created
    #[error("Device error: {message}")]
    Device { message: String },
}

/// Input bytes could not be decoded as an image.
///
/// This is the only validation the preprocessor performs: anything the
/// `image` crate can decode is accepted, regardless of format or dimensions.
#[derive(Error, Debug)]
#[error("Failed to decode image: {message}")]
pub struct ImageDecodeError {
    pub message: String,
}

impl ImageDecodeError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Classifier execution failures. Recoverable per-request, but logged in
/// full since they imply a deeper resource or backend fault.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Building the input tensor on the compute device failed
    #[error("Failed to build input tensor: {context}")]
    Preprocess {
        context: String,
        #[source]
        source: candle_core::Error,
    },

    /// The forward pass itself failed
    #[error("Forward pass failed: {context}")]
    Forward {
        context: String,
        #[source]
        source: candle_core::Error,
    },

    /// A previous forward pass panicked while holding the classifier lock
    #[error("Classifier lock poisoned")]
    LockPoisoned,
}

/// Convenience type alias for Roentgen results.
pub type Result<T> = std::result::Result<T, RoentgenError>;

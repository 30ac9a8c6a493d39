//! Checkpoint reading, key normalization, and weight binding.
//!
//! A checkpoint is a serialized name→tensor mapping. Two on-disk formats
//! are accepted, selected by extension: safetensors (candle-native), and
//! torch pickle archives (the format the training pipeline produced). Keys
//! are normalized before binding:
//!
//! - A `state_dict` container (or its flattened `state_dict.` key prefix)
//!   is unwrapped.
//! - The `module.` prefix left by distributed-training wrappers is stripped
//!   from the keys that carry it. Detection is a full scan over all keys;
//!   checkpoints where only some keys carry the prefix are legal input.
//!
//! Binding is permissive on names and strict on shapes: unmatched names on
//! either side are reported and logged but do not abort loading, while a
//! shape mismatch on a matched name, an unreadable file, or zero name
//! overlap are fatal.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use crate::error::ModelLoadError;
use crate::labels::NUM_FINDINGS;
use crate::model::{ChestClassifier, DenseNet121, InferenceMode};

/// Container key some torch checkpoints nest the weight mapping under.
const STATE_DICT_KEY: &str = "state_dict";

/// Flattened form of the container key, as left by safetensors converters.
const STATE_DICT_PREFIX: &str = "state_dict.";

/// Key prefix added by distributed-training wrappers.
const DISTRIBUTED_PREFIX: &str = "module.";

/// Outcome of binding checkpoint tensors into the classifier.
///
/// Returned on the bound classifier rather than only printed, so callers
/// decide whether the warnings are acceptable.
#[derive(Debug, Clone, Default)]
pub struct BindingReport {
    /// Number of parameters bound from the checkpoint
    pub bound: usize,
    /// Architecture parameters absent from the checkpoint; these keep their
    /// initialization defaults
    pub missing: Vec<String>,
    /// Checkpoint tensors with no architecture counterpart; these are
    /// ignored
    pub unexpected: Vec<String>,
}

impl BindingReport {
    /// Whether every parameter matched in both directions.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Load the classifier from `checkpoint_path` onto `device`.
///
/// On success the classifier is in [`InferenceMode::Eval`] and ready to
/// serve. Every error from this function is fatal: without a bound
/// classifier there is no valid service.
pub fn load(checkpoint_path: &Path, device: &Device) -> Result<ChestClassifier, ModelLoadError> {
    tracing::info!("Loading checkpoint from {:?}", checkpoint_path);

    let raw = read_checkpoint(checkpoint_path, device)?;
    let (tensors, stripped) = normalize_keys(raw);
    if stripped {
        tracing::debug!("Stripped '{DISTRIBUTED_PREFIX}' prefix from checkpoint keys");
    }

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let model =
        DenseNet121::new(NUM_FINDINGS, vb).map_err(|e| ModelLoadError::Architecture {
            message: e.to_string(),
        })?;

    let report = bind(&varmap, &tensors)?;
    if report.bound == 0 {
        return Err(ModelLoadError::NoOverlap {
            path: checkpoint_path.to_path_buf(),
        });
    }
    if !report.missing.is_empty() {
        tracing::warn!(
            "Checkpoint is missing {} parameters (kept at init defaults): {:?}",
            report.missing.len(),
            report.missing
        );
    }
    if !report.unexpected.is_empty() {
        tracing::warn!(
            "Checkpoint carries {} unexpected tensors (ignored): {:?}",
            report.unexpected.len(),
            report.unexpected
        );
    }
    tracing::info!("Classifier ready: {} parameters bound", report.bound);

    Ok(ChestClassifier::new(
        model,
        device.clone(),
        InferenceMode::Eval,
        report,
    ))
}

/// Read the raw name→tensor mapping from disk.
fn read_checkpoint(
    path: &Path,
    device: &Device,
) -> Result<HashMap<String, Tensor>, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }

    let is_safetensors = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("safetensors"));

    if is_safetensors {
        candle_core::safetensors::load(path, device).map_err(|e| ModelLoadError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        // Torch pickle archive. Tensors materialize on the CPU and move to
        // the target device when bound. Try the wrapped layout first, then
        // fall back to a flat top-level mapping.
        let entries = candle_core::pickle::read_all_with_key(path, Some(STATE_DICT_KEY))
            .or_else(|_| candle_core::pickle::read_all(path))
            .map_err(|e| ModelLoadError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(entries.into_iter().collect())
    }
}

/// Undo naming artifacts from how the checkpoint was produced. Returns the
/// normalized mapping and whether the distributed prefix was found.
fn normalize_keys(tensors: HashMap<String, Tensor>) -> (HashMap<String, Tensor>, bool) {
    let tensors: HashMap<String, Tensor> = tensors
        .into_iter()
        .map(|(k, v)| match k.strip_prefix(STATE_DICT_PREFIX) {
            Some(rest) => (rest.to_string(), v),
            None => (k, v),
        })
        .collect();

    // Full scan: any key carrying the prefix triggers stripping, but only
    // the keys that actually carry it are rewritten.
    let has_prefix = tensors.keys().any(|k| k.starts_with(DISTRIBUTED_PREFIX));
    if !has_prefix {
        return (tensors, false);
    }
    let tensors = tensors
        .into_iter()
        .map(|(k, v)| match k.strip_prefix(DISTRIBUTED_PREFIX) {
            Some(rest) => (rest.to_string(), v),
            None => (k, v),
        })
        .collect();
    (tensors, true)
}

/// Copy checkpoint tensors into the architecture's parameter table by name.
fn bind(
    varmap: &VarMap,
    tensors: &HashMap<String, Tensor>,
) -> Result<BindingReport, ModelLoadError> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| ModelLoadError::Architecture {
            message: "parameter table lock poisoned".to_string(),
        })?;

    let mut report = BindingReport::default();
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();

    for name in names {
        let var = &vars[name];
        match tensors.get(name.as_str()) {
            Some(tensor) => {
                let tensor = tensor
                    .to_dtype(DType::F32)
                    .and_then(|t| t.to_device(var.device()))
                    .map_err(|e| ModelLoadError::Device {
                        message: format!("moving '{name}' to target device: {e}"),
                    })?;
                var.set(&tensor).map_err(|e| ModelLoadError::ShapeMismatch {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
                report.bound += 1;
            }
            None => report.missing.push(name.clone()),
        }
    }

    let mut unexpected: Vec<String> = tensors
        .keys()
        .filter(|k| !vars.contains_key(*k))
        .cloned()
        .collect();
    unexpected.sort();
    report.unexpected = unexpected;

    Ok(report)
}

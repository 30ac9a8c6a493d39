//! The bound classifier handle and its execution discipline.
//!
//! A [`ChestClassifier`] is constructed once by [`crate::checkpoint::load`]
//! and shared for the process lifetime. It is an explicitly passed handle,
//! never a module-level singleton: callers own it and hand it to the
//! inference engine.

pub(crate) mod densenet;

pub use densenet::DenseNet121;

use std::sync::Mutex;

use candle_core::{Device, Tensor};

use crate::checkpoint::BindingReport;
use crate::error::InferenceError;
use crate::labels::NUM_FINDINGS;

/// Execution mode, fixed when the classifier is constructed.
///
/// `Eval` runs batch normalization on its stored running statistics and
/// disables any training-only stochastic behavior, so identical inputs
/// always produce identical outputs. The loader always constructs
/// classifiers in `Eval`; `Train` exists for completeness of the flag, not
/// as a runtime switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceMode {
    Train,
    Eval,
}

impl InferenceMode {
    pub fn is_train(self) -> bool {
        matches!(self, InferenceMode::Train)
    }
}

/// A classifier with weights bound from a checkpoint.
///
/// Uses a `Mutex` around the network because the compute backend does not
/// promise that concurrent forward passes on one instance are safe; forward
/// passes are serialized (single-writer discipline). Workers that need
/// parallel inference load one instance each from the same checkpoint.
#[derive(Debug)]
pub struct ChestClassifier {
    model: Mutex<DenseNet121>,
    device: Device,
    mode: InferenceMode,
    report: BindingReport,
}

impl ChestClassifier {
    pub(crate) fn new(
        model: DenseNet121,
        device: Device,
        mode: InferenceMode,
        report: BindingReport,
    ) -> Self {
        Self {
            model: Mutex::new(model),
            device,
            mode,
            report,
        }
    }

    /// The device the classifier's parameters live on. Callers place input
    /// tensors here rather than re-deriving a device of their own.
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn mode(&self) -> InferenceMode {
        self.mode
    }

    /// What the checkpoint binding matched, for callers to decide whether
    /// the warnings are acceptable.
    pub fn binding_report(&self) -> &BindingReport {
        &self.report
    }

    /// Run one forward pass and return the per-label probabilities.
    pub fn forward(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError> {
        let model = self.model.lock().map_err(|_| InferenceError::LockPoisoned)?;
        let probs = model
            .forward_t(input, self.mode.is_train())
            .map_err(|e| InferenceError::Forward {
                context: format!("input shape {:?}", input.dims()),
                source: e,
            })?;
        let probs = probs
            .squeeze(0)
            .and_then(|p| p.to_vec1::<f32>())
            .map_err(|e| InferenceError::Forward {
                context: "reading probabilities".to_string(),
                source: e,
            })?;
        debug_assert_eq!(probs.len(), NUM_FINDINGS);
        Ok(probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    fn classifier() -> ChestClassifier {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = DenseNet121::new(NUM_FINDINGS, vb).unwrap();
        ChestClassifier::new(model, device, InferenceMode::Eval, BindingReport::default())
    }

    #[test]
    fn test_forward_returns_label_width_probabilities() {
        let classifier = classifier();
        let input = Tensor::zeros((1, 3, 64, 64), DType::F32, classifier.device()).unwrap();
        let probs = classifier.forward(&input).unwrap();
        assert_eq!(probs.len(), NUM_FINDINGS);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_loader_mode_is_eval() {
        let classifier = classifier();
        assert_eq!(classifier.mode(), InferenceMode::Eval);
        assert!(!classifier.mode().is_train());
    }
}

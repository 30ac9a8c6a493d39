//! Inference orchestration: decode → preprocess → forward → filter.

use crate::config::InferenceConfig;
use crate::error::Result;
use crate::labels::FINDING_LABELS;
use crate::model::ChestClassifier;
use crate::preprocess;
use crate::types::{Finding, PredictionResult};

/// Default confidence threshold for reporting a finding.
pub const DEFAULT_THRESHOLD: f32 = 0.05;

/// Default label returned when no finding clears the threshold. Must not
/// collide with a real finding name.
pub const DEFAULT_NO_FINDING_LABEL: &str = "No significant findings above threshold";

/// Runs raw image bytes through the full inference pipeline.
///
/// Holds the process-wide classifier handle; one engine serves all
/// requests, and every call is stateless with respect to the classifier's
/// parameters. The engine never retries; request-replay semantics belong
/// to the caller.
pub struct InferenceEngine {
    classifier: ChestClassifier,
    threshold: f32,
    no_finding_label: String,
}

impl InferenceEngine {
    /// Create an engine around a bound classifier.
    pub fn new(classifier: ChestClassifier, config: &InferenceConfig) -> Self {
        Self {
            classifier,
            threshold: config.threshold,
            no_finding_label: config.no_finding_label.clone(),
        }
    }

    pub fn classifier(&self) -> &ChestClassifier {
        &self.classifier
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify raw image bytes with the configured threshold.
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResult> {
        self.predict_with_threshold(bytes, self.threshold)
    }

    /// Classify raw image bytes with a per-call threshold override.
    ///
    /// Either fully succeeds with a [`PredictionResult`] or fully fails
    /// with one error; no partial results. Decode failures propagate as
    /// [`crate::ImageDecodeError`], classifier failures as
    /// [`crate::InferenceError`].
    pub fn predict_with_threshold(&self, bytes: &[u8], threshold: f32) -> Result<PredictionResult> {
        let start = std::time::Instant::now();

        let image = preprocess::decode(bytes)?;
        // Input goes to whichever device the classifier lives on; the
        // engine never picks a device of its own.
        let tensor = preprocess::transform(&image, self.classifier.device())?;
        let probs = self.classifier.forward(&tensor)?;

        let result = filter_findings(&probs, threshold, &self.no_finding_label);
        tracing::debug!(
            "Classified {} bytes in {:?} ({} findings)",
            bytes.len(),
            start.elapsed(),
            result.findings.len()
        );
        Ok(result)
    }
}

/// Keep the findings whose probability clears `threshold`.
///
/// Filtering compares the unrounded probability; the reported confidence is
/// rounded to 3 decimal places. Output preserves label-set order. When
/// nothing clears, the result is a single sentinel entry rather than an
/// empty sequence.
pub(crate) fn filter_findings(
    probs: &[f32],
    threshold: f32,
    no_finding_label: &str,
) -> PredictionResult {
    let findings: Vec<Finding> = FINDING_LABELS
        .iter()
        .zip(probs.iter())
        .filter(|(_, &p)| p >= threshold)
        .map(|(label, &p)| Finding::new(*label, round_confidence(p)))
        .collect();

    if findings.is_empty() {
        return PredictionResult {
            findings: vec![Finding::new(no_finding_label, 0.0)],
        };
    }
    PredictionResult { findings }
}

/// Round to 3 decimal places for reporting.
fn round_confidence(confidence: f32) -> f32 {
    (confidence * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::BindingReport;
    use crate::error::RoentgenError;
    use crate::labels::NUM_FINDINGS;
    use crate::model::{DenseNet121, InferenceMode};
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};
    use image::{DynamicImage, Rgb, RgbImage};

    const SENTINEL: &str = DEFAULT_NO_FINDING_LABEL;

    fn engine() -> InferenceEngine {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = DenseNet121::new(NUM_FINDINGS, vb).unwrap();
        let classifier =
            ChestClassifier::new(model, device, InferenceMode::Eval, BindingReport::default());
        InferenceEngine::new(classifier, &InferenceConfig::default())
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(300, 240, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn labels(result: &PredictionResult) -> Vec<&str> {
        result.findings.iter().map(|f| f.label.as_str()).collect()
    }

    #[test]
    fn test_filter_preserves_label_order() {
        let mut probs = vec![0.0f32; NUM_FINDINGS];
        probs[13] = 0.9; // Hernia
        probs[1] = 0.2; // Cardiomegaly
        probs[9] = 0.5; // Edema

        let result = filter_findings(&probs, 0.05, SENTINEL);
        // Label-set order, not confidence order.
        assert_eq!(labels(&result), vec!["Cardiomegaly", "Edema", "Hernia"]);
    }

    #[test]
    fn test_filter_sentinel_on_empty() {
        let probs = vec![0.01f32; NUM_FINDINGS];
        let result = filter_findings(&probs, 0.05, SENTINEL);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].label, SENTINEL);
        assert_eq!(result.findings[0].confidence, 0.0);
        assert!(result.is_no_finding(SENTINEL));
        assert!(!crate::labels::is_finding_label(SENTINEL));
    }

    #[test]
    fn test_filter_uses_unrounded_value() {
        let mut probs = vec![0.0f32; NUM_FINDINGS];
        probs[0] = 0.0499; // rounds to 0.050 but must be excluded
        probs[1] = 0.0501; // must be included and reported as 0.050

        let result = filter_findings(&probs, 0.05, SENTINEL);
        assert_eq!(labels(&result), vec!["Cardiomegaly"]);
        assert_eq!(result.findings[0].confidence, 0.050);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let probs: Vec<f32> = (0..NUM_FINDINGS).map(|i| i as f32 / NUM_FINDINGS as f32).collect();
        let low = filter_findings(&probs, 0.2, SENTINEL);
        let high = filter_findings(&probs, 0.6, SENTINEL);

        // Raising the threshold never adds labels.
        for finding in &high.findings {
            assert!(labels(&low).contains(&finding.label.as_str()));
        }
        // It also never changes the confidence of a label that remains.
        for finding in &high.findings {
            let before = low
                .findings
                .iter()
                .find(|f| f.label == finding.label)
                .unwrap();
            assert_eq!(before.confidence, finding.confidence);
        }
    }

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(0.0501), 0.050);
        assert_eq!(round_confidence(0.8766), 0.877);
        assert_eq!(round_confidence(1.0), 1.0);
        assert_eq!(round_confidence(0.0), 0.0);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let engine = engine();
        let bytes = png_bytes();

        let a = engine.predict(&bytes).unwrap();
        let b = engine.predict(&bytes).unwrap();

        assert_eq!(a.findings.len(), b.findings.len());
        for (fa, fb) in a.findings.iter().zip(b.findings.iter()) {
            assert_eq!(fa.label, fb.label);
            assert_eq!(fa.confidence, fb.confidence);
        }
    }

    #[test]
    fn test_predict_confidences_are_reported_rounded() {
        let engine = engine();
        let result = engine.predict(&png_bytes()).unwrap();
        for finding in &result.findings {
            assert!((0.0..=1.0).contains(&finding.confidence));
            let scaled = finding.confidence * 1000.0;
            assert!((scaled - scaled.round()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_predict_rejects_undecodable_bytes() {
        let engine = engine();
        let err = engine.predict(b"not an image at all").unwrap_err();
        assert!(matches!(err, RoentgenError::ImageDecode(_)));
    }

    #[test]
    fn test_predict_with_impossible_threshold_yields_sentinel() {
        let engine = engine();
        // Sigmoid outputs never reach 1.1, so nothing can clear this.
        let result = engine
            .predict_with_threshold(&png_bytes(), 1.1)
            .unwrap();
        assert!(result.is_no_finding(SENTINEL));
    }
}

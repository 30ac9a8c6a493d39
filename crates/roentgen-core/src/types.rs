//! Core data types for the Roentgen classification pipeline.
//!
//! These types represent the output of running one radiograph through the
//! inference engine.

use serde::{Deserialize, Serialize};

/// A single finding with its confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// The finding name (e.g., "Cardiomegaly"), or the configured sentinel
    /// label when nothing cleared the threshold
    pub label: String,

    /// Confidence score from 0.0 to 1.0, rounded to 3 decimal places
    pub confidence: f32,
}

impl Finding {
    /// Create a new finding with the given label and confidence.
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// The complete result of classifying one radiograph.
///
/// Findings preserve label-set (index) order, not confidence order. The
/// sequence is never empty: when no finding clears the threshold it holds
/// exactly one sentinel entry whose label is not part of the label set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Findings at or above the threshold, in label-set order
    pub findings: Vec<Finding>,
}

impl PredictionResult {
    /// Whether this result is the empty-result sentinel rather than a list
    /// of real findings.
    pub fn is_no_finding(&self, sentinel_label: &str) -> bool {
        self.findings.len() == 1 && self.findings[0].label == sentinel_label
    }

    /// Human-readable one-line summary, e.g.
    /// `"Cardiomegaly: 54.0%; Edema: 7.5%"`.
    pub fn summary(&self) -> String {
        self.findings
            .iter()
            .map(|f| format!("{}: {:.1}%", f.label, f.confidence * 100.0))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_serde_roundtrip() {
        let finding = Finding::new("Cardiomegaly", 0.54);
        let json = serde_json::to_string(&finding).unwrap();
        assert!(json.contains("\"label\":\"Cardiomegaly\""));

        let parsed: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.label, "Cardiomegaly");
        assert!((parsed.confidence - 0.54).abs() < f32::EPSILON);
    }

    #[test]
    fn test_summary_formatting() {
        let result = PredictionResult {
            findings: vec![Finding::new("Cardiomegaly", 0.54), Finding::new("Edema", 0.075)],
        };
        assert_eq!(result.summary(), "Cardiomegaly: 54.0%; Edema: 7.5%");
    }

    #[test]
    fn test_is_no_finding() {
        let sentinel = "No significant findings above threshold";
        let empty = PredictionResult {
            findings: vec![Finding::new(sentinel, 0.0)],
        };
        assert!(empty.is_no_finding(sentinel));

        // A genuine zero-confidence finding is not the sentinel.
        let real = PredictionResult {
            findings: vec![Finding::new("Hernia", 0.0)],
        };
        assert!(!real.is_no_finding(sentinel));
    }
}

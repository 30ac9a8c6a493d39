//! The fixed set of diagnostic finding labels.
//!
//! Index order is the canonical index-to-name mapping for the classifier's
//! output head and must match the order the head was trained with
//! (ChestX-ray14 convention). Reordering this table silently mislabels
//! every prediction.

/// Number of findings the classifier predicts.
pub const NUM_FINDINGS: usize = 14;

/// Finding names, in output-head order.
pub const FINDING_LABELS: [&str; NUM_FINDINGS] = [
    "Atelectasis",
    "Cardiomegaly",
    "Effusion",
    "Infiltration",
    "Mass",
    "Nodule",
    "Pneumonia",
    "Pneumothorax",
    "Consolidation",
    "Edema",
    "Emphysema",
    "Fibrosis",
    "Pleural_Thickening",
    "Hernia",
];

/// Whether `label` names one of the real findings.
///
/// The empty-result sentinel label is required to return `false` here so it
/// stays distinguishable from a genuine zero-confidence finding.
pub fn is_finding_label(label: &str) -> bool {
    FINDING_LABELS.contains(&label)
}

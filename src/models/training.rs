use serde::{Deserialize, Serialize};

use crate::models::{FeatureRecord, MovementState};

/// Feature record with an optional ground-truth state
///
/// Unlabeled samples (`state == None`) are only useful to the
/// semi-supervised classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    #[serde(flatten)]
    pub features: FeatureRecord,
    #[serde(rename = "Label", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<MovementState>,
}

impl LabeledSample {
    pub fn labeled(features: FeatureRecord, state: MovementState) -> Self {
        Self {
            features,
            state: Some(state),
        }
    }

    pub fn unlabeled(features: FeatureRecord) -> Self {
        Self {
            features,
            state: None,
        }
    }
}

/// Per-class counts and derived scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub state: MovementState,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of samples whose actual state is this class
    pub support: usize,
}

/// Classifier evaluation against held-out labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Classes present in either predictions or labels, in `MovementState` order
    pub classes: Vec<MovementState>,
    /// Row = actual class, column = predicted class
    pub confusion_matrix: Vec<Vec<usize>>,
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    /// Support-weighted averages over the classes
    pub weighted_precision: f64,
    pub weighted_recall: f64,
    pub weighted_f1: f64,
    pub sample_count: usize,
}

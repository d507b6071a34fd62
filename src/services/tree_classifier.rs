use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ClassifierError;
use crate::models::{FeatureRecord, LabeledSample, MovementState};
use crate::services::feature_scaler::feature_matrix;
use crate::services::movement_classifier::{MovementClassifier, RuleBasedClassifier, TrainingState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_depth: Option<usize>,
    /// Smallest total sample weight a node needs before it may split
    pub min_weight_split: f32,
    pub min_samples: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(10),
            min_weight_split: 2.0,
            min_samples: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeModel {
    tree: DecisionTree<f64, usize>,
    frame_rate_mean: f64,
    classes: Vec<MovementState>,
}

impl TreeModel {
    pub fn classes(&self) -> &[MovementState] {
        &self.classes
    }

    fn predict_row(&self, features: [f64; 3]) -> MovementState {
        if features.iter().any(|v| !v.is_finite()) {
            return MovementState::Unclassified;
        }
        let query = Array2::from_shape_vec((1, 3), features.to_vec())
            .unwrap_or_else(|_| Array2::zeros((1, 3)));
        let predicted: Array1<usize> = self.tree.predict(&query);
        predicted
            .first()
            .and_then(|&index| MovementState::from_index(index))
            .unwrap_or(MovementState::Unclassified)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSummary {
    pub samples: usize,
    pub classes: Vec<MovementState>,
    /// Agreement with the training labels
    pub training_accuracy: f64,
}

/// Supervised decision-tree classifier
#[derive(Debug, Clone, Default)]
pub struct TreeClassifier {
    config: TreeConfig,
    state: TrainingState<TreeModel>,
}

impl TreeClassifier {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            state: TrainingState::Untrained,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_trained()
    }

    pub fn model(&self) -> Result<&TreeModel, ClassifierError> {
        self.state.model()
    }

    /// Train against the labels the rule table assigns to each record
    pub fn fit_rule_labels(
        &mut self,
        records: &[FeatureRecord],
        rules: &RuleBasedClassifier,
    ) -> Result<TreeSummary, ClassifierError> {
        let labels: Vec<MovementState> = records
            .iter()
            .map(|r| rules.classify(r.cog_angle, r.movement_rate))
            .collect();
        self.fit(records, &labels)
    }

    /// Train on the labeled subset of `samples`
    pub fn fit_labeled(&mut self, samples: &[LabeledSample]) -> Result<TreeSummary, ClassifierError> {
        let (records, labels): (Vec<FeatureRecord>, Vec<MovementState>) = samples
            .iter()
            .filter_map(|s| s.state.map(|state| (s.features, state)))
            .unzip();
        if records.is_empty() {
            return Err(ClassifierError::NoLabeledSamples);
        }
        self.fit(&records, &labels)
    }

    pub fn fit(
        &mut self,
        records: &[FeatureRecord],
        labels: &[MovementState],
    ) -> Result<TreeSummary, ClassifierError> {
        if records.len() != labels.len() {
            return Err(ClassifierError::LengthMismatch {
                predicted: records.len(),
                actual: labels.len(),
            });
        }

        let (kept, kept_labels): (Vec<FeatureRecord>, Vec<MovementState>) = records
            .iter()
            .zip(labels)
            .filter(|(r, _)| r.to_ndarray().iter().all(|v| v.is_finite()))
            .map(|(r, l)| (*r, *l))
            .unzip();

        if kept.len() < self.config.min_samples.max(1) {
            return Err(ClassifierError::InsufficientData {
                needed: self.config.min_samples.max(1),
                got: kept.len(),
            });
        }

        let x = feature_matrix(&kept);
        let y: Array1<usize> = kept_labels.iter().map(|s| s.index()).collect();
        let frame_rate_mean = x.column(0).mean().unwrap_or(0.0);

        let dataset = Dataset::new(x, y);
        let tree = DecisionTree::params()
            .max_depth(self.config.max_depth)
            .min_weight_split(self.config.min_weight_split)
            .fit(&dataset)
            .map_err(|e| ClassifierError::Training(e.to_string()))?;

        let mut classes = kept_labels.clone();
        classes.sort();
        classes.dedup();

        let model = TreeModel {
            tree,
            frame_rate_mean,
            classes: classes.clone(),
        };

        let correct = kept
            .iter()
            .zip(&kept_labels)
            .filter(|(r, l)| model.predict_row([r.frame_rate, r.cog_angle, r.movement_rate]) == **l)
            .count();
        let training_accuracy = correct as f64 / kept.len() as f64;

        info!(
            "Trained decision tree on {} samples, {} classes, training accuracy {:.3}",
            kept.len(),
            classes.len(),
            training_accuracy
        );

        self.state = TrainingState::Trained(model);

        Ok(TreeSummary {
            samples: kept.len(),
            classes,
            training_accuracy,
        })
    }
}

impl MovementClassifier for TreeClassifier {
    fn predict(&self, cog_angle: f64, movement_rate: f64) -> Result<MovementState, ClassifierError> {
        let model = self.state.model()?;
        Ok(model.predict_row([model.frame_rate_mean, cog_angle, movement_rate]))
    }

    fn predict_record(&self, record: &FeatureRecord) -> Result<MovementState, ClassifierError> {
        let model = self.state.model()?;
        Ok(model.predict_row([record.frame_rate, record.cog_angle, record.movement_rate]))
    }

    fn name(&self) -> &'static str {
        "tree"
    }
}

/// Semi-supervised movement classifier
///
/// A handful of hand-labeled samples seed label distributions that spread
/// over a k-nearest-neighbour graph of the standardized feature vectors.
/// Labeled rows are clamped on every iteration; samples no labeled sample
/// can reach stay `Unclassified`.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ClassifierError;
use crate::models::{FeatureRecord, LabeledSample, MovementState};
use crate::services::feature_scaler::{feature_matrix, FeatureScaler};
use crate::services::movement_classifier::{MovementClassifier, TrainingState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub n_neighbors: usize,
    pub max_iterations: usize,
    /// Stop once the summed absolute change of the distributions drops below this
    pub tolerance: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 9,
            max_iterations: 1000,
            tolerance: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropagationModel {
    scaler: FeatureScaler,
    /// Standardized training vectors
    points: Array2<f64>,
    /// Row-normalized label distribution per training sample, columns follow `classes`
    distributions: Array2<f64>,
    classes: Vec<MovementState>,
    transduction: Vec<MovementState>,
    n_neighbors: usize,
}

impl PropagationModel {
    pub fn classes(&self) -> &[MovementState] {
        &self.classes
    }

    fn classify_distribution(&self, distribution: ArrayView1<f64>) -> MovementState {
        argmax_state(distribution, &self.classes)
    }

    fn predict_scaled(&self, point: ArrayView1<f64>) -> MovementState {
        let neighbours = nearest_neighbours(&self.points, point, self.n_neighbors);
        let mut votes = Array1::<f64>::zeros(self.classes.len());
        for j in neighbours {
            votes += &self.distributions.row(j);
        }
        self.classify_distribution(votes.view())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationSummary {
    pub iterations: usize,
    pub converged: bool,
    pub labeled: usize,
    pub unlabeled: usize,
    /// Samples no labeled sample could reach
    pub unreached: usize,
    pub classes: Vec<MovementState>,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LabelPropagationClassifier {
    config: PropagationConfig,
    state: TrainingState<PropagationModel>,
}

impl LabelPropagationClassifier {
    pub fn new(config: PropagationConfig) -> Self {
        Self {
            config,
            state: TrainingState::Untrained,
        }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_trained()
    }

    pub fn model(&self) -> Result<&PropagationModel, ClassifierError> {
        self.state.model()
    }

    /// Labels inferred for the training samples, in input order (non-finite samples excluded)
    pub fn transduction(&self) -> Result<&[MovementState], ClassifierError> {
        Ok(&self.state.model()?.transduction)
    }

    pub fn fit(&mut self, samples: &[LabeledSample]) -> Result<PropagationSummary, ClassifierError> {
        if self.config.n_neighbors == 0 {
            return Err(ClassifierError::InvalidConfig("n_neighbors must be at least 1".into()));
        }

        let kept: Vec<&LabeledSample> = samples
            .iter()
            .filter(|s| s.features.to_ndarray().iter().all(|v| v.is_finite()))
            .collect();
        let dropped = samples.len() - kept.len();
        if dropped > 0 {
            warn!("Dropped {} samples with non-finite features", dropped);
        }

        let mut classes: Vec<MovementState> = kept.iter().filter_map(|s| s.state).collect();
        classes.sort();
        classes.dedup();
        if classes.is_empty() {
            return Err(ClassifierError::NoLabeledSamples);
        }
        if kept.len() < 2 {
            return Err(ClassifierError::InsufficientData {
                needed: 2,
                got: kept.len(),
            });
        }

        let raw = feature_matrix(kept.iter().map(|s| &s.features));
        let scaler = FeatureScaler::fit(&raw)?;
        let points = scaler.transform(&raw);
        let n = points.nrows();
        let k = self.config.n_neighbors.min(n);

        let graph: Vec<Vec<usize>> = (0..n)
            .map(|i| nearest_neighbours(&points, points.row(i), k))
            .collect();

        let mut seed = Array2::<f64>::zeros((n, classes.len()));
        let mut clamped = vec![false; n];
        for (i, sample) in kept.iter().enumerate() {
            if let Some(state) = sample.state {
                if let Ok(c) = classes.binary_search(&state) {
                    seed[[i, c]] = 1.0;
                    clamped[i] = true;
                }
            }
        }

        let mut distributions = seed.clone();
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;
            let mut next = Array2::<f64>::zeros(distributions.raw_dim());

            for (i, neighbours) in graph.iter().enumerate() {
                let mut row = next.row_mut(i);
                if clamped[i] {
                    row.assign(&seed.row(i));
                    continue;
                }
                let weight = 1.0 / neighbours.len() as f64;
                for &j in neighbours {
                    row.scaled_add(weight, &distributions.row(j));
                }
                let total = row.sum();
                if total > 0.0 {
                    row /= total;
                }
            }

            let change: f64 = (&next - &distributions).mapv(f64::abs).sum();
            distributions = next;
            if change < self.config.tolerance {
                converged = true;
                break;
            }
        }

        if converged {
            debug!("Label propagation converged after {} iterations", iterations);
        } else {
            warn!(
                "Label propagation stopped at max_iterations={} without converging",
                self.config.max_iterations
            );
        }

        let transduction: Vec<MovementState> = distributions
            .rows()
            .into_iter()
            .map(|row| argmax_state(row, &classes))
            .collect();

        let labeled = clamped.iter().filter(|&&c| c).count();
        let unreached = transduction
            .iter()
            .filter(|&&s| s == MovementState::Unclassified)
            .count();

        info!(
            "Propagated {} labels over {} samples ({} unreached)",
            labeled,
            n,
            unreached
        );

        let summary = PropagationSummary {
            iterations,
            converged,
            labeled,
            unlabeled: n - labeled,
            unreached,
            classes: classes.clone(),
            dropped,
        };

        self.state = TrainingState::Trained(PropagationModel {
            scaler,
            points,
            distributions,
            classes,
            transduction,
            n_neighbors: k,
        });

        Ok(summary)
    }
}

impl MovementClassifier for LabelPropagationClassifier {
    fn predict(&self, cog_angle: f64, movement_rate: f64) -> Result<MovementState, ClassifierError> {
        let model = self.state.model()?;
        let features = Array1::from(vec![model.scaler.frame_rate_mean(), cog_angle, movement_rate]);
        if features.iter().any(|v| !v.is_finite()) {
            return Ok(MovementState::Unclassified);
        }
        Ok(model.predict_scaled(model.scaler.transform_single(&features).view()))
    }

    fn predict_record(&self, record: &FeatureRecord) -> Result<MovementState, ClassifierError> {
        let model = self.state.model()?;
        let features = record.to_ndarray();
        if features.iter().any(|v| !v.is_finite()) {
            return Ok(MovementState::Unclassified);
        }
        Ok(model.predict_scaled(model.scaler.transform_single(&features).view()))
    }

    fn name(&self) -> &'static str {
        "propagation"
    }
}

/// Indices of the `k` training rows closest to `point`, nearest first
fn nearest_neighbours(points: &Array2<f64>, point: ArrayView1<f64>, k: usize) -> Vec<usize> {
    let mut distances: Vec<(usize, f64)> = points
        .rows()
        .into_iter()
        .enumerate()
        .map(|(j, row)| {
            let d: f64 = row.iter().zip(point.iter()).map(|(a, b)| (a - b).powi(2)).sum();
            (j, d)
        })
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.into_iter().take(k).map(|(j, _)| j).collect()
}

/// Most probable class; an all-zero distribution is `Unclassified`
fn argmax_state(distribution: ArrayView1<f64>, classes: &[MovementState]) -> MovementState {
    let mut best: Option<(usize, f64)> = None;
    for (c, &p) in distribution.iter().enumerate() {
        if p > 0.0 && best.map_or(true, |(_, bp)| p > bp) {
            best = Some((c, p));
        }
    }
    best.and_then(|(c, _)| classes.get(c).copied())
        .unwrap_or(MovementState::Unclassified)
}

/// K-means movement classifier
///
/// Clusters standardized (frame rate, CoG angle, movement rate) vectors,
/// choosing the cluster count by silhouette score unless one is fixed, then
/// names each cluster by running its centroid through the rule table.

use std::collections::HashSet;

use linfa::metrics::SilhouetteScore;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ClassifierError;
use crate::models::{FeatureRecord, MovementState};
use crate::services::feature_scaler::{feature_matrix, FeatureScaler, ScalerSnapshot};
use crate::services::movement_classifier::{MovementClassifier, RuleBasedClassifier, TrainingState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Fixed cluster count; `None` selects by silhouette score
    pub n_clusters: Option<usize>,
    /// Upper bound of the automatic search, starting at 2
    pub max_clusters: usize,
    pub max_iterations: u64,
    pub tolerance: f64,
    /// Samples moving faster than this are dropped before fitting
    pub outlier_movement_rate: f64,
    /// Silhouette scoring uses at most this many evenly strided samples
    pub silhouette_sample_limit: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: None,
            max_clusters: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            outlier_movement_rate: 1000.0,
            silhouette_sample_limit: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterModel {
    scaler: FeatureScaler,
    /// Centroids in standardized space, one row per cluster
    centroids: Array2<f64>,
    states: Vec<MovementState>,
    silhouette: Option<f64>,
}

impl ClusterModel {
    pub fn cluster_count(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn states(&self) -> &[MovementState] {
        &self.states
    }

    pub fn silhouette(&self) -> Option<f64> {
        self.silhouette
    }

    /// Centroids converted back to feature units
    pub fn centroids_in_feature_units(&self) -> Vec<Array1<f64>> {
        self.centroids
            .rows()
            .into_iter()
            .map(|row| self.scaler.inverse_single(&row.to_owned()))
            .collect()
    }

    fn nearest_cluster(&self, features: &Array1<f64>) -> usize {
        nearest_centroid(&self.centroids, self.scaler.transform_single(features).view())
    }
}

/// Outcome of a fit, for logging and CLI display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub n_clusters: usize,
    pub silhouette: Option<f64>,
    /// Silhouette score per candidate cluster count tried
    pub candidates: Vec<(usize, f64)>,
    pub cluster_sizes: Vec<usize>,
    pub states: Vec<MovementState>,
    pub samples_used: usize,
    pub outliers_removed: usize,
}

/// Trained k-means model in a serializable form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModelSnapshot {
    pub centroids: Vec<Vec<f64>>,
    pub scaler: ScalerSnapshot,
    pub states: Vec<MovementState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silhouette: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ClusterClassifier {
    config: ClusterConfig,
    rules: RuleBasedClassifier,
    state: TrainingState<ClusterModel>,
}

impl ClusterClassifier {
    pub fn new(config: ClusterConfig) -> Self {
        Self::with_rules(config, RuleBasedClassifier::new())
    }

    /// Use custom rule thresholds to name the clusters
    pub fn with_rules(config: ClusterConfig, rules: RuleBasedClassifier) -> Self {
        Self {
            config,
            rules,
            state: TrainingState::Untrained,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_trained()
    }

    pub fn model(&self) -> Result<&ClusterModel, ClassifierError> {
        self.state.model()
    }

    /// Fit the model, replacing any previous one
    pub fn fit(&mut self, records: &[FeatureRecord]) -> Result<ClusterSummary, ClassifierError> {
        if let Some(0) = self.config.n_clusters {
            return Err(ClassifierError::InvalidConfig("n_clusters must be at least 1".into()));
        }

        let kept: Vec<&FeatureRecord> = records
            .iter()
            .filter(|r| {
                r.frame_rate.is_finite()
                    && r.cog_angle.is_finite()
                    && r.movement_rate.is_finite()
                    && r.movement_rate <= self.config.outlier_movement_rate
            })
            .collect();
        let outliers_removed = records.len() - kept.len();
        if outliers_removed > 0 {
            warn!("Dropped {} outlier or non-finite samples before clustering", outliers_removed);
        }

        let raw = feature_matrix(kept.iter().copied());
        let scaler = FeatureScaler::fit(&raw).map_err(|_| ClassifierError::InsufficientData {
            needed: self.minimum_samples(),
            got: 0,
        })?;
        let scaled = scaler.transform(&raw);
        let distinct = distinct_rows(&scaled);

        let (centroids, silhouette, candidates) = match self.config.n_clusters {
            Some(k) => {
                if distinct < k {
                    return Err(ClassifierError::InsufficientData { needed: k, got: distinct });
                }
                let centroids = self.run_kmeans(&scaled, k)?;
                let score = if k >= 2 && k < scaled.nrows() {
                    Some(self.score(&scaled, &centroids)?)
                } else {
                    None
                };
                (centroids, score, Vec::new())
            }
            None => {
                if distinct < 3 {
                    return Err(ClassifierError::InsufficientData {
                        needed: 3,
                        got: distinct,
                    });
                }
                let upper = self.config.max_clusters.min(distinct - 1).max(2);
                let mut best: Option<(Array2<f64>, f64)> = None;
                let mut candidates = Vec::new();

                for k in 2..=upper {
                    let centroids = self.run_kmeans(&scaled, k)?;
                    let score = self.score(&scaled, &centroids)?;
                    debug!("k={} silhouette={:.4}", k, score);
                    candidates.push((k, score));
                    if best.as_ref().map_or(true, |(_, s)| score > *s) {
                        best = Some((centroids, score));
                    }
                }

                let (centroids, score) = best.ok_or_else(|| {
                    ClassifierError::Training("no cluster count candidates evaluated".into())
                })?;
                (centroids, Some(score), candidates)
            }
        };

        let states: Vec<MovementState> = centroids
            .rows()
            .into_iter()
            .map(|row| {
                let unscaled = scaler.inverse_single(&row.to_owned());
                self.rules.classify(unscaled[1], unscaled[2])
            })
            .collect();

        let mut cluster_sizes = vec![0; centroids.nrows()];
        for row in scaled.rows() {
            cluster_sizes[nearest_centroid(&centroids, row)] += 1;
        }

        info!(
            "Fitted k-means with {} clusters on {} samples (silhouette {:?})",
            centroids.nrows(),
            scaled.nrows(),
            silhouette
        );

        let summary = ClusterSummary {
            n_clusters: centroids.nrows(),
            silhouette,
            candidates,
            cluster_sizes,
            states: states.clone(),
            samples_used: scaled.nrows(),
            outliers_removed,
        };

        self.state = TrainingState::Trained(ClusterModel {
            scaler,
            centroids,
            states,
            silhouette,
        });

        Ok(summary)
    }

    /// Label every record with its cluster's state
    pub fn assign(&self, records: &[FeatureRecord]) -> Result<Vec<MovementState>, ClassifierError> {
        records.iter().map(|r| self.predict_record(r)).collect()
    }

    pub fn snapshot(&self) -> Result<ClusterModelSnapshot, ClassifierError> {
        let model = self.state.model()?;
        Ok(ClusterModelSnapshot {
            centroids: model.centroids.rows().into_iter().map(|r| r.to_vec()).collect(),
            scaler: model.scaler.to_snapshot(),
            states: model.states.clone(),
            silhouette: model.silhouette,
        })
    }

    /// Rebuild a trained classifier from a snapshot
    pub fn from_snapshot(snapshot: &ClusterModelSnapshot) -> Result<Self, ClassifierError> {
        let k = snapshot.centroids.len();
        if k == 0 || snapshot.states.len() != k {
            return Err(ClassifierError::InvalidConfig(format!(
                "snapshot has {} centroids and {} states",
                k,
                snapshot.states.len()
            )));
        }
        if snapshot.centroids.iter().any(|c| c.len() != 3) {
            return Err(ClassifierError::InvalidConfig("centroids must have 3 features".into()));
        }
        if snapshot.centroids.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ClassifierError::InvalidConfig("centroids must be finite".into()));
        }

        let flat: Vec<f64> = snapshot.centroids.iter().flatten().copied().collect();
        let centroids = Array2::from_shape_vec((k, 3), flat)
            .map_err(|e| ClassifierError::InvalidConfig(e.to_string()))?;

        let config = ClusterConfig {
            n_clusters: Some(k),
            ..ClusterConfig::default()
        };
        let mut classifier = Self::new(config);
        classifier.state = TrainingState::Trained(ClusterModel {
            scaler: FeatureScaler::from_snapshot(&snapshot.scaler)?,
            centroids,
            states: snapshot.states.clone(),
            silhouette: snapshot.silhouette,
        });
        Ok(classifier)
    }

    fn minimum_samples(&self) -> usize {
        self.config.n_clusters.unwrap_or(3)
    }

    fn run_kmeans(&self, scaled: &Array2<f64>, k: usize) -> Result<Array2<f64>, ClassifierError> {
        let dataset = DatasetBase::from(scaled.clone());
        let model = KMeans::params(k)
            .max_n_iterations(self.config.max_iterations)
            .tolerance(self.config.tolerance)
            .fit(&dataset)
            .map_err(|e| ClassifierError::Training(e.to_string()))?;

        Ok(model.centroids().to_owned())
    }

    fn score(&self, scaled: &Array2<f64>, centroids: &Array2<f64>) -> Result<f64, ClassifierError> {
        let limit = self.config.silhouette_sample_limit.max(2);
        let stride = (scaled.nrows() + limit - 1) / limit;
        let sample = if stride > 1 {
            let indices: Vec<usize> = (0..scaled.nrows()).step_by(stride).collect();
            scaled.select(Axis(0), &indices)
        } else {
            scaled.clone()
        };

        let labels: Array1<usize> = sample
            .rows()
            .into_iter()
            .map(|row| nearest_centroid(centroids, row))
            .collect();
        silhouette(sample, labels)
    }

    fn features_for(&self, model: &ClusterModel, cog_angle: f64, movement_rate: f64) -> Array1<f64> {
        Array1::from(vec![model.scaler.frame_rate_mean(), cog_angle, movement_rate])
    }
}

impl Default for ClusterClassifier {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl MovementClassifier for ClusterClassifier {
    fn predict(&self, cog_angle: f64, movement_rate: f64) -> Result<MovementState, ClassifierError> {
        let model = self.state.model()?;
        if !cog_angle.is_finite() || !movement_rate.is_finite() {
            return Ok(MovementState::Unclassified);
        }
        let features = self.features_for(model, cog_angle, movement_rate);
        Ok(model.states[model.nearest_cluster(&features)])
    }

    fn predict_record(&self, record: &FeatureRecord) -> Result<MovementState, ClassifierError> {
        let model = self.state.model()?;
        let features = record.to_ndarray();
        if features.iter().any(|v| !v.is_finite()) {
            return Ok(MovementState::Unclassified);
        }
        Ok(model.states[model.nearest_cluster(&features)])
    }

    fn name(&self) -> &'static str {
        "kmeans"
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest_centroid(centroids: &Array2<f64>, point: ArrayView1<f64>) -> usize {
    centroids
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(c, point)))
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
        .0
}

fn distinct_rows(data: &Array2<f64>) -> usize {
    data.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Mean silhouette coefficient of a labelled sample, 0 when fewer than two
/// clusters are populated
fn silhouette(sample: Array2<f64>, labels: Array1<usize>) -> Result<f64, ClassifierError> {
    if labels.iter().collect::<HashSet<_>>().len() < 2 {
        return Ok(0.0);
    }
    let score = DatasetBase::new(sample, labels)
        .silhouette_score()
        .map_err(|e| ClassifierError::Training(e.to_string()))?;
    Ok(if score.is_finite() { score } else { 0.0 })
}

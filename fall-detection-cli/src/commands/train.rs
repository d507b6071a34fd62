use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use fall_detection::models::{FeatureRecord, LabeledSample};
use fall_detection::services::{
    evaluate_classifier, split_train_test, ClusterClassifier, ClusterModelSnapshot, LabelPropagationClassifier,
    RuleBasedClassifier, TreeClassifier,
};

use crate::config::Config;
use crate::input::read_samples;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Unsupervised k-means, clusters named by the rule table
    Kmeans,
    /// Label propagation from the labeled samples
    Propagation,
    /// Decision tree on explicit labels, or rule-derived labels when none are given
    Tree,
}

#[derive(Args)]
pub struct TrainCommand {
    /// Which classifier to train
    #[arg(value_enum)]
    algorithm: Algorithm,

    /// Feature records as JSON lines, optionally with a `Label` field
    input: PathBuf,

    /// Fixed k-means cluster count (default: chosen by silhouette score)
    #[arg(long)]
    clusters: Option<usize>,

    /// Share of samples held out for evaluation
    #[arg(long, default_value = "0.2")]
    test_ratio: f64,

    /// Seed for the train/test shuffle
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Write the trained k-means model as a JSON snapshot
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Load a k-means snapshot written by `train kmeans --output`
pub fn load_snapshot(path: &Path) -> Result<ClusterClassifier> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read model {}", path.display()))?;
    let snapshot: ClusterModelSnapshot =
        serde_json::from_str(&contents).with_context(|| format!("Invalid model snapshot {}", path.display()))?;
    Ok(ClusterClassifier::from_snapshot(&snapshot)?)
}

impl TrainCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let samples = read_samples(&self.input)?;
        if samples.is_empty() {
            bail!("{} contains no feature records", self.input.display());
        }
        if self.output.is_some() && self.algorithm != Algorithm::Kmeans {
            bail!("--output is only supported for kmeans");
        }
        info!("Loaded {} samples from {}", samples.len(), self.input.display());

        let report = match self.algorithm {
            Algorithm::Kmeans => self.train_kmeans(config, &samples)?,
            Algorithm::Propagation => self.train_propagation(config, &samples)?,
            Algorithm::Tree => self.train_tree(config, &samples)?,
        };

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    fn train_kmeans(&self, config: &Config, samples: &[LabeledSample]) -> Result<Value> {
        let mut cluster_config = config.clustering.clone();
        if self.clusters.is_some() {
            cluster_config.n_clusters = self.clusters;
        }

        let rules = RuleBasedClassifier::with_thresholds(config.thresholds.clone())?;
        let mut classifier = ClusterClassifier::with_rules(cluster_config, rules);
        let records: Vec<FeatureRecord> = samples.iter().map(|s| s.features).collect();
        let summary = classifier.fit(&records)?;

        if let Some(path) = &self.output {
            let snapshot = classifier.snapshot()?;
            fs::write(path, serde_json::to_string_pretty(&snapshot)?)
                .with_context(|| format!("Failed to write model {}", path.display()))?;
            info!("Saved k-means model to {}", path.display());
        }

        // Any labels present serve as ground truth for the clusters
        let evaluation = if samples.iter().any(|s| s.state.is_some()) {
            Some(evaluate_classifier(&classifier, samples)?)
        } else {
            None
        };

        Ok(json!({
            "algorithm": "kmeans",
            "summary": summary,
            "evaluation": evaluation,
        }))
    }

    fn train_propagation(&self, config: &Config, samples: &[LabeledSample]) -> Result<Value> {
        let (labeled, unlabeled): (Vec<LabeledSample>, Vec<LabeledSample>) =
            samples.iter().cloned().partition(|s| s.state.is_some());
        if labeled.is_empty() {
            bail!("label propagation needs samples with a Label field");
        }

        let (seeds, held_out) = split_train_test(&labeled, self.test_ratio, self.seed)?;

        // Held-out samples join training without their labels
        let mut training = seeds;
        training.extend(unlabeled);
        training.extend(held_out.iter().map(|s| LabeledSample::unlabeled(s.features)));

        let mut classifier = LabelPropagationClassifier::new(config.propagation.clone());
        let summary = classifier.fit(&training)?;

        let evaluation = if held_out.is_empty() {
            None
        } else {
            Some(evaluate_classifier(&classifier, &held_out)?)
        };

        Ok(json!({
            "algorithm": "propagation",
            "summary": summary,
            "evaluation": evaluation,
        }))
    }

    fn train_tree(&self, config: &Config, samples: &[LabeledSample]) -> Result<Value> {
        let rules = RuleBasedClassifier::with_thresholds(config.thresholds.clone())?;
        let has_labels = samples.iter().any(|s| s.state.is_some());

        // Without explicit labels the rule table supplies them
        let labeled: Vec<LabeledSample> = if has_labels {
            samples.iter().filter(|s| s.state.is_some()).cloned().collect()
        } else {
            samples
                .iter()
                .map(|s| LabeledSample::labeled(s.features, rules.classify(s.features.cog_angle, s.features.movement_rate)))
                .collect()
        };

        let (train, test) = split_train_test(&labeled, self.test_ratio, self.seed)?;
        let mut classifier = TreeClassifier::new(config.tree.clone());
        let summary = classifier.fit_labeled(&train)?;

        let evaluation = if test.is_empty() {
            None
        } else {
            Some(evaluate_classifier(&classifier, &test)?)
        };

        let label_source = if has_labels { "explicit" } else { "rules" };
        Ok(json!({
            "algorithm": "tree",
            "label_source": label_source,
            "summary": summary,
            "evaluation": evaluation,
        }))
    }
}

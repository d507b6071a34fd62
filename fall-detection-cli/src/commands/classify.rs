use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use fall_detection::services::{AlertPolicy, MovementClassifier, RuleBasedClassifier};

use super::train::load_snapshot;
use crate::config::Config;

#[derive(Args)]
pub struct ClassifyCommand {
    /// Center-of-gravity angle in degrees
    #[arg(long, allow_hyphen_values = true)]
    angle: f64,

    /// Movement rate
    #[arg(long, allow_hyphen_values = true)]
    rate: f64,

    /// Classify with a trained k-means snapshot instead of the rule table
    #[arg(long)]
    model: Option<PathBuf>,
}

impl ClassifyCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let classifier: Box<dyn MovementClassifier> = match &self.model {
            Some(path) => Box::new(load_snapshot(path)?),
            None => Box::new(RuleBasedClassifier::with_thresholds(config.thresholds.clone())?),
        };

        let state = classifier.predict(self.angle, self.rate)?;
        let alert = AlertPolicy::new().classify(chrono::Local::now().naive_local(), state);

        let output = json!({
            "classifier": classifier.name(),
            "cog_angle": self.angle,
            "movement_rate": self.rate,
            "alert": alert,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

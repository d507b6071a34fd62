use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use fall_detection::models::CoordinateScale;
use fall_detection::services::{BatchFeatureService, FrameRateMode};

use crate::config::Config;
use crate::input::read_pose_table;

#[derive(Args)]
pub struct FeaturesCommand {
    /// File of pose payloads, one JSON object (or PoseData message) per line
    input: PathBuf,

    /// Write rows here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Zero rows whose latency jitter (seconds) is below this value
    #[arg(long)]
    threshold: Option<f64>,

    /// Report a constant frame rate of 1
    #[arg(long)]
    fixed_frame_rate: bool,

    /// Compute geometry in pixels instead of normalized coordinates
    #[arg(long)]
    real_scale: bool,
}

impl FeaturesCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let mut extractor_config = config.extractor.clone();
        if self.threshold.is_some() {
            extractor_config.frame_rate_threshold = self.threshold;
        }
        if self.fixed_frame_rate {
            extractor_config.frame_rate_mode = FrameRateMode::FixedUnit;
        }
        if self.real_scale {
            extractor_config.coordinate_scale = CoordinateScale::RealScale;
        }

        let rows = read_pose_table(&self.input)?;
        let output = BatchFeatureService::new(extractor_config).extract(rows);

        let mut writer: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
            )),
            None => Box::new(BufWriter::new(io::stdout())),
        };
        for row in &output.rows {
            writeln!(writer, "{}", serde_json::to_string(row)?)?;
        }
        writer.flush()?;

        for rejected in &output.rejected {
            info!("Row {} rejected: {}", rejected.source_index, rejected.reason);
        }
        info!(
            "Wrote {} rows ({} skipped by threshold, {} source rows rejected)",
            output.rows.len(),
            output.skipped_count(),
            output.rejected.len()
        );

        Ok(())
    }
}

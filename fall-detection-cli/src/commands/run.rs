use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fall_detection::models::{Envelope, PosePayload, Topic};
use fall_detection::services::{MovementClassifier, RuleBasedClassifier, StreamRouter};
use fall_detection::{EnvelopeError, PipelineError};

use super::train::load_snapshot;
use crate::config::Config;
use crate::input::open_reader;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Args)]
pub struct RunCommand {
    /// Message file to replay (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Do not publish informational alerts
    #[arg(long)]
    alerts_only: bool,

    /// Classify with a trained k-means snapshot instead of the rule table
    #[arg(long)]
    model: Option<PathBuf>,

    /// Forget a stream after this many seconds of capture time without frames
    #[arg(long, default_value = "60")]
    stream_timeout: u32,
}

#[derive(Debug, Default)]
struct RunStats {
    frames: u64,
    invalid_frames: u64,
    records: u64,
    alerts: u64,
}

impl RunCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let classifier: Arc<dyn MovementClassifier> = match &self.model {
            Some(path) => Arc::new(load_snapshot(path)?),
            None => Arc::new(RuleBasedClassifier::with_thresholds(config.thresholds.clone())?),
        };
        info!("Classifying with '{}'", classifier.name());

        let max_idle = chrono::Duration::seconds(i64::from(self.stream_timeout));
        let mut router = StreamRouter::new(config.extractor.clone(), classifier);
        let (tx, mut rx) = mpsc::channel::<PosePayload>(CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_pose_messages(self.input.clone(), tx));

        let mut out = BufWriter::new(tokio::io::stdout());
        let mut stats = RunStats::default();

        while let Some(payload) = rx.recv().await {
            stats.frames += 1;
            let routed = match router.route(payload) {
                Ok(Some(routed)) => routed,
                Ok(None) => continue,
                Err(PipelineError::InvalidFrame(e)) => {
                    warn!("Skipping invalid frame: {}", e);
                    stats.invalid_frames += 1;
                    continue;
                }
                Err(e) => return Err(e).context("Classification failed"),
            };

            let output = routed.output;
            router.prune_idle(output.record.timestamp, max_idle);
            publish(&mut out, &Envelope::new(Topic::FeatureData, &output.record)?).await?;
            stats.records += 1;

            if self.alerts_only && !output.alert.is_actionable() {
                continue;
            }
            publish(&mut out, &Envelope::new(Topic::FallAlert, &output.alert)?).await?;
            stats.alerts += 1;
            if output.alert.requires_notification() {
                warn!("[{}] {}", routed.stream_id, output.alert.human_description);
            }
        }

        out.flush().await?;
        let lines = reader.await.context("Reader task panicked")??;

        info!(
            "Processed {} lines: {} frames, {} invalid, {} records, {} alerts across {} streams",
            lines,
            stats.frames,
            stats.invalid_frames,
            stats.records,
            stats.alerts,
            router.stream_count()
        );
        Ok(())
    }
}

async fn publish<W: AsyncWrite + Unpin>(out: &mut W, envelope: &Envelope) -> Result<()> {
    out.write_all(envelope.to_line().as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}

/// Reader task: forward every decodable `PoseData` payload to the channel
async fn read_pose_messages(input: Option<PathBuf>, tx: mpsc::Sender<PosePayload>) -> Result<u64> {
    let reader = open_reader(input.as_deref()).await?;
    let mut lines = reader.lines();
    let mut count = 0;

    while let Some(line) = lines.next_line().await? {
        count += 1;
        let envelope = match Envelope::parse_line(&line) {
            Ok(envelope) => envelope,
            Err(EnvelopeError::Empty) => continue,
            Err(EnvelopeError::UnknownTopic(topic)) => {
                debug!("Ignoring topic {}", topic);
                continue;
            }
            Err(e) => {
                warn!("Skipping malformed message on line {}: {}", count, e);
                continue;
            }
        };

        if envelope.topic != Topic::PoseData {
            continue;
        }

        match envelope.decode::<PosePayload>() {
            Ok(payload) => {
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Skipping undecodable pose payload on line {}: {}", count, e),
        }
    }

    Ok(count)
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::errors::PipelineError;
use crate::models::{LandmarkFrame, PosePayload};
use crate::services::feature_extractor::ExtractorConfig;
use crate::services::movement_classifier::MovementClassifier;
use crate::services::pipeline::{FallDetectionPipeline, PipelineOutput};

/// Stream id for payloads that carry none
pub const DEFAULT_STREAM: &str = "default";

#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutput {
    pub stream_id: String,
    pub output: PipelineOutput,
}

struct StreamSlot {
    pipeline: FallDetectionPipeline,
    /// Latest capture time routed to this stream
    last_seen: NaiveDateTime,
}

/// One pipeline per camera stream, created on first sight
pub struct StreamRouter {
    config: ExtractorConfig,
    classifier: Arc<dyn MovementClassifier>,
    streams: HashMap<String, StreamSlot>,
}

impl StreamRouter {
    pub fn new(config: ExtractorConfig, classifier: Arc<dyn MovementClassifier>) -> Self {
        Self {
            config,
            classifier,
            streams: HashMap::new(),
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.streams.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn pipeline(&self, stream_id: &str) -> Option<&FallDetectionPipeline> {
        self.streams.get(stream_id).map(|slot| &slot.pipeline)
    }

    pub fn last_seen(&self, stream_id: &str) -> Option<NaiveDateTime> {
        self.streams.get(stream_id).map(|slot| slot.last_seen)
    }

    /// Route a wire payload by its `Stream_Id`
    pub fn route(&mut self, payload: PosePayload) -> Result<Option<StreamOutput>, PipelineError> {
        let stream_id = payload
            .stream_id
            .clone()
            .unwrap_or_else(|| DEFAULT_STREAM.to_string());
        let frame = LandmarkFrame::try_from(payload)?;
        self.process(&stream_id, frame)
    }

    pub fn process(&mut self, stream_id: &str, frame: LandmarkFrame) -> Result<Option<StreamOutput>, PipelineError> {
        let (config, classifier) = (&self.config, &self.classifier);
        let seen = frame.image_timestamp;
        let slot = self.streams.entry(stream_id.to_string()).or_insert_with(|| {
            info!("New stream '{}'", stream_id);
            StreamSlot {
                pipeline: FallDetectionPipeline::new(config.clone(), Arc::clone(classifier)),
                last_seen: seen,
            }
        });
        slot.last_seen = slot.last_seen.max(seen);

        Ok(slot.pipeline.process(frame)?.map(|output| StreamOutput {
            stream_id: stream_id.to_string(),
            output,
        }))
    }

    /// Drop streams whose latest frame is more than `max_idle` older than `now`.
    ///
    /// Returns the removed stream ids in sorted order.
    pub fn prune_idle(&mut self, now: NaiveDateTime, max_idle: Duration) -> Vec<String> {
        let mut removed: Vec<String> = self
            .streams
            .iter()
            .filter(|(_, slot)| now - slot.last_seen > max_idle)
            .map(|(id, _)| id.clone())
            .collect();
        removed.sort_unstable();

        for id in &removed {
            self.streams.remove(id);
            info!("Stream '{}' idle for more than {}s, dropped", id, max_idle.num_seconds());
        }
        removed
    }

    /// Drop a stream's state; its next frame bootstraps again
    pub fn remove(&mut self, stream_id: &str) -> bool {
        self.streams.remove(stream_id).is_some()
    }
}

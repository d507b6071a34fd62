use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::errors::PipelineError;
use crate::models::{Alert, FeatureRecord, LandmarkFrame, MovementState, PosePayload};
use crate::services::alert_policy::AlertPolicy;
use crate::services::feature_extractor::{ExtractorConfig, ExtractorStats, FeatureExtractor};
use crate::services::movement_classifier::{MovementClassifier, RuleBasedClassifier};

/// Everything derived from one frame transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub record: FeatureRecord,
    pub state: MovementState,
    pub alert: Alert,
}

/// Extractor, classifier and alert policy for a single camera stream
///
/// The classifier is shared between streams; the extractor never is.
#[derive(Clone)]
pub struct FallDetectionPipeline {
    extractor: FeatureExtractor,
    classifier: Arc<dyn MovementClassifier>,
    policy: AlertPolicy,
}

impl FallDetectionPipeline {
    pub fn new(config: ExtractorConfig, classifier: Arc<dyn MovementClassifier>) -> Self {
        Self {
            extractor: FeatureExtractor::with_config(config),
            classifier,
            policy: AlertPolicy::new(),
        }
    }

    /// Default extractor with the default rule table
    pub fn with_rules() -> Self {
        Self::new(ExtractorConfig::default(), Arc::new(RuleBasedClassifier::new()))
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    pub fn extractor_stats(&self) -> ExtractorStats {
        self.extractor.stats()
    }

    /// Feed one frame; `Ok(None)` while the extractor is bootstrapping
    pub fn process(&mut self, frame: LandmarkFrame) -> Result<Option<PipelineOutput>, PipelineError> {
        let record = match self.extractor.process(frame)? {
            Some(record) => record,
            None => return Ok(None),
        };

        let state = self.classifier.predict_record(&record)?;
        let alert = self.policy.classify(record.timestamp, state);
        debug!(
            "angle={:.2} rate={:.4} fps={:.2} -> {}",
            record.cog_angle, record.movement_rate, record.frame_rate, state
        );

        Ok(Some(PipelineOutput { record, state, alert }))
    }

    /// Validate a wire payload and feed it
    pub fn process_payload(&mut self, payload: PosePayload) -> Result<Option<PipelineOutput>, PipelineError> {
        let frame = LandmarkFrame::try_from(payload)?;
        self.process(frame)
    }

    pub fn reset(&mut self) {
        self.extractor.reset();
    }
}

impl std::fmt::Debug for FallDetectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallDetectionPipeline")
            .field("extractor", &self.extractor)
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ClassifierError, InvalidFrameError};
    use crate::models::{timestamp, Landmark, PoseLandmark, Severity, LANDMARK_COUNT};
    use crate::services::cluster_classifier::ClusterClassifier;
    use assert_matches::assert_matches;

    fn lying_frame(ts: &str, offset: f64) -> LandmarkFrame {
        let mut landmarks = vec![Landmark::new(0.5 + offset, 0.8); LANDMARK_COUNT];
        landmarks[PoseLandmark::Nose.index()] = Landmark::new(0.2 + offset, 0.8);
        landmarks[PoseLandmark::LeftHip.index()] = Landmark::new(0.6 + offset, 0.79);
        landmarks[PoseLandmark::RightHip.index()] = Landmark::new(0.6 + offset, 0.81);
        let at = timestamp::parse(ts).unwrap();
        LandmarkFrame::new(at, at, 640, 480, landmarks).unwrap()
    }

    #[test]
    fn test_still_lying_person_raises_critical_alert() {
        let mut pipeline = FallDetectionPipeline::with_rules();
        assert!(pipeline.process(lying_frame("2024-05-01 10:00:00.000000", 0.0)).unwrap().is_none());

        let output = pipeline
            .process(lying_frame("2024-05-01 10:00:00.100000", 0.0))
            .unwrap()
            .unwrap();

        assert_eq!(output.state, MovementState::Fallen);
        assert_eq!(output.alert.severity, Severity::Critical);
        assert_eq!(output.alert.timestamp, output.record.timestamp);
        assert_eq!(pipeline.classifier_name(), "rules");
    }

    #[test]
    fn test_invalid_payload_is_reported() {
        let mut pipeline = FallDetectionPipeline::with_rules();
        let mut payload = PosePayload::from(&lying_frame("2024-05-01 10:00:00.000000", 0.0));
        payload.landmarks.truncate(60);

        assert_matches!(
            pipeline.process_payload(payload),
            Err(PipelineError::InvalidFrame(InvalidFrameError::LandmarkCount { actual: 30, .. }))
        );
        assert_eq!(pipeline.extractor_stats().frames_accepted, 0);
    }

    #[test]
    fn test_untrained_classifier_surfaces_error() {
        let classifier: Arc<dyn MovementClassifier> = Arc::new(ClusterClassifier::default());
        let mut pipeline = FallDetectionPipeline::new(ExtractorConfig::default(), classifier);
        pipeline.process(lying_frame("2024-05-01 10:00:00.000000", 0.0)).unwrap();

        assert_matches!(
            pipeline.process(lying_frame("2024-05-01 10:00:00.100000", 0.0)),
            Err(PipelineError::Classifier(ClassifierError::ModelNotTrained))
        );
    }
}

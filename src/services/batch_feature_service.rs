/// Batch feature extraction over a recorded table of pose rows
///
/// Unlike the streaming extractor, the batch pipeline keeps one output row per
/// consecutive pair of valid input rows, even when a row is skipped by the
/// jitter threshold, so outputs stay aligned with the source table.

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::InvalidFrameError;
use crate::models::{FeatureRecord, LandmarkFrame};
use crate::services::feature_extractor::{compute_features, ExtractorConfig};

/// One output row of the batch pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFeatureRow {
    /// Index of the later source row of the pair
    pub source_index: usize,
    #[serde(flatten)]
    pub record: FeatureRecord,
    /// Change in capture-to-pose latency between the two rows, in seconds
    pub jitter: f64,
    /// Row was zeroed because `jitter` fell below the configured threshold
    pub skipped: bool,
}

/// Source row that never became part of a pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub source_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchFeatureOutput {
    pub rows: Vec<BatchFeatureRow>,
    pub rejected: Vec<RejectedRow>,
}

impl BatchFeatureOutput {
    pub fn skipped_count(&self) -> usize {
        self.rows.iter().filter(|row| row.skipped).count()
    }

    /// Records that carry real measurements
    pub fn measured_records(&self) -> impl Iterator<Item = &FeatureRecord> {
        self.rows.iter().filter(|row| !row.skipped).map(|row| &row.record)
    }
}

/// Batch feature pipeline
#[derive(Debug, Clone, Default)]
pub struct BatchFeatureService {
    config: ExtractorConfig,
}

impl BatchFeatureService {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Latency jitter between two rows: `| |img_a - pose_a| - |img_b - pose_b| |`
    pub fn jitter(previous: &LandmarkFrame, current: &LandmarkFrame) -> f64 {
        (previous.pose_latency() - current.pose_latency()).abs()
    }

    /// Process an ordered table of parsed rows.
    ///
    /// Rows that failed ingestion are recorded in `rejected` and the pair is
    /// formed with the next valid row instead.
    pub fn extract<I>(&self, rows: I) -> BatchFeatureOutput
    where
        I: IntoIterator<Item = Result<LandmarkFrame, InvalidFrameError>>,
    {
        let mut output = BatchFeatureOutput::default();
        let mut previous: Option<LandmarkFrame> = None;

        for (index, row) in rows.into_iter().enumerate() {
            let frame = match row.and_then(|frame| frame.validate().map(|_| frame)) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping source row {}: {}", index, e);
                    output.rejected.push(RejectedRow {
                        source_index: index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(prev) = previous.as_ref() {
                output.rows.push(self.pair_row(index, prev, &frame));
            }
            previous = Some(frame);
        }

        info!(
            "Batch extraction produced {} rows ({} skipped, {} rejected)",
            output.rows.len(),
            output.skipped_count(),
            output.rejected.len()
        );

        output
    }

    fn pair_row(&self, source_index: usize, previous: &LandmarkFrame, current: &LandmarkFrame) -> BatchFeatureRow {
        let jitter = Self::jitter(previous, current);

        let skipped = self
            .config
            .frame_rate_threshold
            .map_or(false, |threshold| jitter < threshold);

        let record = if skipped {
            FeatureRecord::zeroed(current.image_timestamp)
        } else {
            compute_features(previous, current, &self.config)
        };

        BatchFeatureRow {
            source_index,
            record,
            jitter,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Landmark, PoseLandmark, LANDMARK_COUNT};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn row(image_ms: i64, latency_ms: i64, nose_x: f64) -> Result<LandmarkFrame, InvalidFrameError> {
        let image = base_time() + Duration::milliseconds(image_ms);
        let mut landmarks = vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        landmarks[PoseLandmark::Nose.index()] = Landmark::new(nose_x, 0.2);
        landmarks[PoseLandmark::LeftHip.index()] = Landmark::new(0.45, 0.7);
        landmarks[PoseLandmark::RightHip.index()] = Landmark::new(0.55, 0.7);
        LandmarkFrame::new(image, image + Duration::milliseconds(latency_ms), 1920, 1080, landmarks)
    }

    #[test]
    fn test_one_row_per_pair() {
        let service = BatchFeatureService::default();
        let output = service.extract(vec![row(0, 10, 0.5), row(100, 12, 0.5), row(200, 15, 0.5)]);

        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0].source_index, 1);
        assert_eq!(output.rows[1].source_index, 2);
        assert!(output.rows.iter().all(|r| !r.skipped));
        assert!((output.rows[0].jitter - 0.002).abs() < 1e-9);
        assert!((output.rows[0].record.frame_rate - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_zeroes_low_jitter_rows() {
        let service = BatchFeatureService::new(ExtractorConfig {
            frame_rate_threshold: Some(0.0039),
            ..ExtractorConfig::default()
        });
        // Jitters: 0.001 (below), 0.010 (above)
        let output = service.extract(vec![row(0, 10, 0.5), row(100, 11, 0.4), row(200, 21, 0.5)]);

        assert_eq!(output.rows.len(), 2);
        assert!(output.rows[0].skipped);
        assert_eq!(output.rows[0].record, FeatureRecord::zeroed(base_time() + Duration::milliseconds(100)));
        assert!(!output.rows[1].skipped);
        assert!(output.rows[1].record.movement_rate > 0.0);
        assert_eq!(output.skipped_count(), 1);
        assert_eq!(output.measured_records().count(), 1);
    }

    #[test]
    fn test_rejected_rows_are_recorded_and_bridged() {
        let service = BatchFeatureService::default();
        let broken = Err(InvalidFrameError::NoPoseDetected);
        let output = service.extract(vec![row(0, 10, 0.5), broken, row(200, 10, 0.5)]);

        assert_eq!(output.rejected.len(), 1);
        assert_eq!(output.rejected[0].source_index, 1);
        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0].source_index, 2);
        assert!((output.rows[0].record.frame_rate - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_unvalidated_frame_is_rejected() {
        let service = BatchFeatureService::default();
        let mut short = row(100, 10, 0.5).unwrap();
        short.landmarks.truncate(12);
        let output = service.extract(vec![row(0, 10, 0.5), Ok(short)]);

        assert!(output.rows.is_empty());
        assert_eq!(output.rejected.len(), 1);
    }

    #[test]
    fn test_empty_table() {
        let output = BatchFeatureService::default().extract(Vec::new());
        assert_eq!(output, BatchFeatureOutput::default());
    }
}

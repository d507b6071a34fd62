/// Feature Extraction Service
///
/// Converts a stream of pose frames into one feature record per consecutive
/// frame pair:
/// - Frame rate (timestamp-derived or fixed unit)
/// - Center-of-gravity angle (nose to hip midpoint, folded into [0, 90] degrees)
/// - Movement rate (average skeleton-edge endpoint displacement per second)
///
/// Only the immediately previous frame is retained. One extractor serves one
/// camera stream; frames must arrive in non-decreasing capture order for the
/// features to be meaningful, but out-of-order input never panics.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::InvalidFrameError;
use crate::models::timestamp;
use crate::models::{CoordinateScale, FeatureRecord, LandmarkFrame, PoseLandmark, SKELETON_EDGES};

/// How the frame-rate feature is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRateMode {
    /// `1 / Δt` from capture timestamps, 0 when Δt <= 0
    #[default]
    #[serde(alias = "machine")]
    MachineClock,
    /// Constant 1, for sources whose timestamp granularity is not trusted
    #[serde(alias = "fixed")]
    FixedUnit,
}

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Coordinate space for angle and displacement calculations
    #[serde(default)]
    pub coordinate_scale: CoordinateScale,
    #[serde(default)]
    pub frame_rate_mode: FrameRateMode,
    /// Jitter threshold (seconds) below which batch rows are zeroed
    #[serde(default)]
    pub frame_rate_threshold: Option<f64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            coordinate_scale: CoordinateScale::Normalized,
            frame_rate_mode: FrameRateMode::MachineClock,
            frame_rate_threshold: None,
        }
    }
}

/// Extractor state machine: nothing seen yet, or primed with one frame
#[derive(Debug, Clone, Default)]
pub enum ExtractorState {
    #[default]
    Empty,
    Primed { previous: LandmarkFrame },
}

/// Running counters for one extractor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractorStats {
    pub frames_accepted: u64,
    pub frames_rejected: u64,
    pub records_emitted: u64,
    /// Frame pairs with Δt <= 0
    pub degenerate_intervals: u64,
}

/// Feature extractor service
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
    state: ExtractorState,
    stats: ExtractorStats,
}

impl FeatureExtractor {
    /// Create a new extractor with default configuration
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    /// Create a new extractor with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self {
            config,
            state: ExtractorState::Empty,
            stats: ExtractorStats::default(),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn state(&self) -> &ExtractorState {
        &self.state
    }

    pub fn stats(&self) -> ExtractorStats {
        self.stats
    }

    pub fn is_primed(&self) -> bool {
        matches!(self.state, ExtractorState::Primed { .. })
    }

    /// Feed the next frame of the stream.
    ///
    /// Returns `Ok(None)` for the first valid frame. An invalid frame is
    /// rejected without touching the stored previous frame.
    pub fn process(&mut self, frame: LandmarkFrame) -> Result<Option<FeatureRecord>, InvalidFrameError> {
        if let Err(e) = frame.validate() {
            self.stats.frames_rejected += 1;
            warn!("Rejected pose frame at {}: {}", timestamp::format(&frame.image_timestamp), e);
            return Err(e);
        }
        self.stats.frames_accepted += 1;

        let previous = match std::mem::take(&mut self.state) {
            ExtractorState::Empty => {
                debug!("Extractor primed at {}", timestamp::format(&frame.image_timestamp));
                self.state = ExtractorState::Primed { previous: frame };
                return Ok(None);
            }
            ExtractorState::Primed { previous } => previous,
        };

        let record = compute_features(&previous, &frame, &self.config);
        if interval_seconds(&previous, &frame) <= 0.0 {
            self.stats.degenerate_intervals += 1;
        }
        self.stats.records_emitted += 1;
        self.state = ExtractorState::Primed { previous: frame };

        Ok(Some(record))
    }

    /// Forget the previous frame and counters
    pub fn reset(&mut self) {
        self.state = ExtractorState::Empty;
        self.stats = ExtractorStats::default();
    }
}

/// Capture-time interval between two frames in seconds
pub fn interval_seconds(previous: &LandmarkFrame, current: &LandmarkFrame) -> f64 {
    timestamp::seconds_between(&previous.image_timestamp, &current.image_timestamp)
}

/// Derive the three features for a validated frame pair.
///
/// Both frames must have passed `LandmarkFrame::validate`. Real-scale mode
/// denormalizes both frames with the current frame's dimensions.
pub fn compute_features(
    previous: &LandmarkFrame,
    current: &LandmarkFrame,
    config: &ExtractorConfig,
) -> FeatureRecord {
    let dt = interval_seconds(previous, current);
    if dt <= 0.0 {
        debug!(
            "Non-positive frame interval ({:.6}s) at {}",
            dt,
            timestamp::format(&current.image_timestamp)
        );
    }

    let frame_rate = match config.frame_rate_mode {
        FrameRateMode::MachineClock if dt > 0.0 => 1.0 / dt,
        FrameRateMode::MachineClock => 0.0,
        FrameRateMode::FixedUnit => 1.0,
    };

    let cog_angle = calculate_cog_angle(current, config.coordinate_scale);

    let movement_rate = if dt > 0.0 {
        average_edge_displacement(previous, current, config.coordinate_scale) / dt
    } else {
        0.0
    };

    FeatureRecord {
        timestamp: current.image_timestamp,
        frame_rate,
        cog_angle,
        movement_rate,
    }
}

/// Angle of the nose to hip-midpoint vector, in degrees from the horizontal.
///
/// Both components are taken as absolute values, so lean direction is
/// discarded and the result stays in [0, 90]. A zero-length vector yields 0.
pub fn calculate_cog_angle(frame: &LandmarkFrame, scale: CoordinateScale) -> f64 {
    let (w, h) = (frame.max_width, frame.max_height);
    let (Some(left_hip), Some(right_hip), Some(nose)) = (
        frame.point(PoseLandmark::LeftHip, scale, w, h),
        frame.point(PoseLandmark::RightHip, scale, w, h),
        frame.point(PoseLandmark::Nose, scale, w, h),
    ) else {
        return 0.0;
    };

    let cog = left_hip.midpoint(&right_hip);
    let dx = (cog.x - nose.x).abs();
    let dy = (cog.y - nose.y).abs();

    dy.atan2(dx).to_degrees().clamp(0.0, 90.0)
}

/// Mean over the skeleton edges of the mean displacement of each edge's two
/// endpoints between the previous and current frame
pub fn average_edge_displacement(
    previous: &LandmarkFrame,
    current: &LandmarkFrame,
    scale: CoordinateScale,
) -> f64 {
    let (w, h) = (current.max_width, current.max_height);
    let displacement = |landmark: PoseLandmark| -> f64 {
        match (
            previous.point(landmark, scale, w, h),
            current.point(landmark, scale, w, h),
        ) {
            (Some(before), Some(after)) => before.distance_to(&after),
            _ => 0.0,
        }
    };

    let total: f64 = SKELETON_EDGES
        .iter()
        .map(|&(start, end)| (displacement(start) + displacement(end)) / 2.0)
        .sum();

    total / SKELETON_EDGES.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Landmark, LANDMARK_COUNT};
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at_micros(micros: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(10, 0, 0, micros)
            .unwrap()
    }

    /// Upright pose: nose above the hip midpoint
    fn standing_landmarks() -> Vec<Landmark> {
        let mut landmarks = vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        landmarks[PoseLandmark::Nose.index()] = Landmark::new(0.5, 0.3);
        landmarks[PoseLandmark::LeftHip.index()] = Landmark::new(0.4, 0.6);
        landmarks[PoseLandmark::RightHip.index()] = Landmark::new(0.6, 0.6);
        landmarks
    }

    fn frame_at(micros: u32, landmarks: Vec<Landmark>) -> LandmarkFrame {
        LandmarkFrame::new(at_micros(micros), at_micros(micros), 640, 480, landmarks).unwrap()
    }

    fn shifted(landmarks: &[Landmark], dx: f64, dy: f64) -> Vec<Landmark> {
        landmarks.iter().map(|lm| Landmark::new(lm.x + dx, lm.y + dy)).collect()
    }

    #[test]
    fn test_first_frame_bootstraps() {
        let mut extractor = FeatureExtractor::new();
        assert!(!extractor.is_primed());

        let result = extractor.process(frame_at(0, standing_landmarks())).unwrap();
        assert!(result.is_none());
        assert!(extractor.is_primed());
    }

    #[test]
    fn test_second_frame_emits_record() {
        let mut extractor = FeatureExtractor::new();
        extractor.process(frame_at(0, standing_landmarks())).unwrap();
        let record = extractor
            .process(frame_at(100_000, standing_landmarks()))
            .unwrap()
            .expect("second frame should produce features");

        assert!((record.frame_rate - 10.0).abs() < 1e-9);
        assert!((record.cog_angle - 90.0).abs() < 1e-9);
        assert_eq!(record.movement_rate, 0.0);
        assert_eq!(record.timestamp, at_micros(100_000));
    }

    #[test]
    fn test_uniform_shift_movement_rate() {
        let mut extractor = FeatureExtractor::new();
        let base = standing_landmarks();
        extractor.process(frame_at(0, base.clone())).unwrap();

        // Every landmark moves 0.03 right and 0.04 down: displacement 0.05 over 0.5s
        let record = extractor
            .process(frame_at(500_000, shifted(&base, 0.03, 0.04)))
            .unwrap()
            .unwrap();
        assert!((record.movement_rate - 0.1).abs() < 1e-9);
        assert!((record.frame_rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_real_scale_movement_rate() {
        let config = ExtractorConfig {
            coordinate_scale: CoordinateScale::RealScale,
            ..ExtractorConfig::default()
        };
        let mut extractor = FeatureExtractor::with_config(config);
        let base = standing_landmarks();
        extractor.process(frame_at(0, base.clone())).unwrap();

        // 0.1 of a 640px-wide frame in one second
        let record = extractor
            .process(frame_at(1_000_000 - 1, shifted(&base, 0.1, 0.0)))
            .unwrap()
            .unwrap();
        assert!((record.movement_rate - 64.0).abs() < 1e-3);
    }

    #[test]
    fn test_real_scale_changes_angle() {
        let mut landmarks = standing_landmarks();
        landmarks[PoseLandmark::Nose.index()] = Landmark::new(0.3, 0.4);
        let frame = frame_at(0, landmarks);

        // Normalized: dx = 0.2, dy = 0.2 -> 45 degrees
        let normalized = calculate_cog_angle(&frame, CoordinateScale::Normalized);
        assert!((normalized - 45.0).abs() < 1e-9);

        // Pixels: dx = 128, dy = 96
        let real = calculate_cog_angle(&frame, CoordinateScale::RealScale);
        assert!((real - (96.0f64).atan2(128.0).to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn test_lying_pose_angle_is_small() {
        let mut landmarks = standing_landmarks();
        landmarks[PoseLandmark::Nose.index()] = Landmark::new(0.1, 0.61);
        let angle = calculate_cog_angle(&frame_at(0, landmarks), CoordinateScale::Normalized);
        assert!(angle < 5.0);
    }

    #[test]
    fn test_coincident_nose_and_hips_angle_is_zero() {
        let landmarks = vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        let angle = calculate_cog_angle(&frame_at(0, landmarks), CoordinateScale::Normalized);
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_zero_interval_is_degenerate_not_fatal() {
        let mut extractor = FeatureExtractor::new();
        let base = standing_landmarks();
        extractor.process(frame_at(0, base.clone())).unwrap();

        let record = extractor
            .process(frame_at(0, shifted(&base, 0.1, 0.1)))
            .unwrap()
            .unwrap();
        assert_eq!(record.frame_rate, 0.0);
        assert_eq!(record.movement_rate, 0.0);
        assert_eq!(extractor.stats().degenerate_intervals, 1);
    }

    #[test]
    fn test_out_of_order_frame_is_degenerate() {
        let mut extractor = FeatureExtractor::new();
        extractor.process(frame_at(200_000, standing_landmarks())).unwrap();
        let record = extractor
            .process(frame_at(100_000, standing_landmarks()))
            .unwrap()
            .unwrap();
        assert_eq!(record.frame_rate, 0.0);
        assert_eq!(record.movement_rate, 0.0);
    }

    #[test]
    fn test_fixed_unit_frame_rate() {
        let config = ExtractorConfig {
            frame_rate_mode: FrameRateMode::FixedUnit,
            ..ExtractorConfig::default()
        };
        let mut extractor = FeatureExtractor::with_config(config);
        extractor.process(frame_at(0, standing_landmarks())).unwrap();
        let record = extractor
            .process(frame_at(40_000, standing_landmarks()))
            .unwrap()
            .unwrap();
        assert_eq!(record.frame_rate, 1.0);
    }

    #[test]
    fn test_invalid_frame_leaves_state_untouched() {
        let mut extractor = FeatureExtractor::new();
        let mut short = frame_at(0, standing_landmarks());
        short.landmarks.truncate(30);

        assert_matches!(
            extractor.process(short),
            Err(InvalidFrameError::LandmarkCount { expected: 33, actual: 30 })
        );
        assert!(!extractor.is_primed());

        // Next valid frame still bootstraps
        assert!(extractor.process(frame_at(0, standing_landmarks())).unwrap().is_none());
        assert_eq!(extractor.stats().frames_rejected, 1);
        assert_eq!(extractor.stats().frames_accepted, 1);
    }

    #[test]
    fn test_extreme_hips_rejected_in_real_scale() {
        let config = ExtractorConfig {
            coordinate_scale: CoordinateScale::RealScale,
            ..ExtractorConfig::default()
        };
        let mut extractor = FeatureExtractor::with_config(config);

        let mut landmarks = standing_landmarks();
        landmarks[PoseLandmark::LeftHip.index()] = Landmark::new(1e308, 0.6);
        landmarks[PoseLandmark::RightHip.index()] = Landmark::new(-1e308, 0.6);
        // Struct literal skips the validating constructor
        let extreme = |micros| LandmarkFrame {
            image_timestamp: at_micros(micros),
            pose_timestamp: at_micros(micros),
            max_width: 640,
            max_height: 480,
            landmarks: landmarks.clone(),
        };

        assert_matches!(
            extractor.process(extreme(0)),
            Err(InvalidFrameError::CoordinateOutOfRange { index: 23 })
        );
        extractor.process(frame_at(0, standing_landmarks())).unwrap();
        assert_matches!(
            extractor.process(extreme(100_000)),
            Err(InvalidFrameError::CoordinateOutOfRange { .. })
        );

        let record = extractor
            .process(frame_at(200_000, standing_landmarks()))
            .unwrap()
            .unwrap();
        assert!((0.0..=90.0).contains(&record.cog_angle));
        assert!(record.movement_rate.is_finite());
        assert_eq!(extractor.stats().frames_rejected, 2);
    }

    #[test]
    fn test_invalid_frame_while_primed_keeps_previous() {
        let mut extractor = FeatureExtractor::new();
        extractor.process(frame_at(0, standing_landmarks())).unwrap();

        let mut empty = frame_at(50_000, standing_landmarks());
        empty.landmarks.clear();
        assert_matches!(extractor.process(empty), Err(InvalidFrameError::NoPoseDetected));

        // Interval is measured against the frame at t=0, not the rejected one
        let record = extractor
            .process(frame_at(100_000, standing_landmarks()))
            .unwrap()
            .unwrap();
        assert!((record.frame_rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_returns_to_bootstrap() {
        let mut extractor = FeatureExtractor::new();
        extractor.process(frame_at(0, standing_landmarks())).unwrap();
        extractor.process(frame_at(100_000, standing_landmarks())).unwrap();
        extractor.reset();

        assert!(!extractor.is_primed());
        assert_eq!(extractor.stats(), ExtractorStats::default());
        assert!(extractor.process(frame_at(200_000, standing_landmarks())).unwrap().is_none());
    }
}

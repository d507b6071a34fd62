/// Pose landmark models and the pose estimator's wire payload
///
/// This module provides the landmark representation used by the feature
/// extractor, the 33-point anatomical index, the skeleton edge set used for
/// movement measurement, and validation at the ingestion boundary.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::InvalidFrameError;
use crate::models::timestamp;

/// Number of landmarks produced by the pose estimator per detected person
pub const LANDMARK_COUNT: usize = 33;

/// Largest accepted normalized coordinate magnitude.
///
/// Landmarks of body parts outside the image fall slightly outside [0, 1];
/// anything beyond this many frame sizes is estimator garbage and would
/// overflow the pixel-space geometry.
pub const COORDINATE_LIMIT: f64 = 10.0;

/// Single landmark position, normalized to [0, 1] relative to the frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Depth estimate, when the estimator provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_depth(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Check that every present coordinate is a finite number
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.map_or(true, f64::is_finite)
    }

    /// Check that the planar coordinates lie within `COORDINATE_LIMIT`
    pub fn is_in_range(&self) -> bool {
        self.x.abs() <= COORDINATE_LIMIT && self.y.abs() <= COORDINATE_LIMIT
    }

    /// Planar position in the requested coordinate space
    pub fn to_point(&self, scale: CoordinateScale, width: u32, height: u32) -> Point {
        match scale {
            CoordinateScale::Normalized => Point { x: self.x, y: self.y },
            CoordinateScale::RealScale => Point {
                x: self.x * width as f64,
                y: self.y * height as f64,
            },
        }
    }
}

/// Planar point used by the geometric feature calculations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Calculate Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

/// Coordinate space used for geometric features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateScale {
    /// Keep estimator output in [0, 1]
    #[default]
    Normalized,
    /// Multiply by frame width/height to get pixel coordinates
    #[serde(alias = "real")]
    RealScale,
}

/// Anatomical landmark indices emitted by the pose estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get landmark name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left_eye_inner",
            Self::LeftEye => "left_eye",
            Self::LeftEyeOuter => "left_eye_outer",
            Self::RightEyeInner => "right_eye_inner",
            Self::RightEye => "right_eye",
            Self::RightEyeOuter => "right_eye_outer",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::MouthLeft => "mouth_left",
            Self::MouthRight => "mouth_right",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftPinky => "left_pinky",
            Self::RightPinky => "right_pinky",
            Self::LeftIndex => "left_index",
            Self::RightIndex => "right_index",
            Self::LeftThumb => "left_thumb",
            Self::RightThumb => "right_thumb",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftHeel => "left_heel",
            Self::RightHeel => "right_heel",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }
}

/// Skeleton edges whose endpoint displacement defines the movement rate.
///
/// Nose to left shoulder, the shoulder/hip quadrilateral, both arms (the left
/// one anchored at the shoulder from the wrist side) and both legs.
pub const SKELETON_EDGES: [(PoseLandmark, PoseLandmark); 13] = [
    (PoseLandmark::Nose, PoseLandmark::LeftShoulder),
    (PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder),
    (PoseLandmark::RightShoulder, PoseLandmark::RightHip),
    (PoseLandmark::RightHip, PoseLandmark::LeftHip),
    (PoseLandmark::LeftHip, PoseLandmark::LeftShoulder),
    (PoseLandmark::LeftWrist, PoseLandmark::LeftElbow),
    (PoseLandmark::LeftElbow, PoseLandmark::LeftShoulder),
    (PoseLandmark::RightShoulder, PoseLandmark::RightElbow),
    (PoseLandmark::RightElbow, PoseLandmark::RightWrist),
    (PoseLandmark::LeftHip, PoseLandmark::LeftKnee),
    (PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle),
    (PoseLandmark::RightHip, PoseLandmark::RightKnee),
    (PoseLandmark::RightKnee, PoseLandmark::RightAnkle),
];

/// One timestamped pose observation
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    /// When the source frame was captured
    pub image_timestamp: NaiveDateTime,
    /// When landmark extraction completed
    pub pose_timestamp: NaiveDateTime,
    /// Source frame width in pixels
    pub max_width: u32,
    /// Source frame height in pixels
    pub max_height: u32,
    /// Landmarks in `PoseLandmark` index order
    pub landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    /// Create a validated frame
    pub fn new(
        image_timestamp: NaiveDateTime,
        pose_timestamp: NaiveDateTime,
        max_width: u32,
        max_height: u32,
        landmarks: Vec<Landmark>,
    ) -> Result<Self, InvalidFrameError> {
        let frame = Self {
            image_timestamp,
            pose_timestamp,
            max_width,
            max_height,
            landmarks,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Check the landmark count, coordinates and frame dimensions
    pub fn validate(&self) -> Result<(), InvalidFrameError> {
        if self.landmarks.is_empty() {
            return Err(InvalidFrameError::NoPoseDetected);
        }
        if self.landmarks.len() != LANDMARK_COUNT {
            return Err(InvalidFrameError::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: self.landmarks.len(),
            });
        }
        if let Some(index) = self.landmarks.iter().position(|lm| !lm.is_finite()) {
            return Err(InvalidFrameError::NonFiniteCoordinate { index });
        }
        if let Some(index) = self.landmarks.iter().position(|lm| !lm.is_in_range()) {
            return Err(InvalidFrameError::CoordinateOutOfRange { index });
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(InvalidFrameError::InvalidDimensions {
                width: self.max_width,
                height: self.max_height,
            });
        }
        Ok(())
    }

    /// Position of a landmark in the requested coordinate space,
    /// denormalized with the given frame dimensions
    pub fn point(&self, which: PoseLandmark, scale: CoordinateScale, width: u32, height: u32) -> Option<Point> {
        self.landmarks
            .get(which.index())
            .map(|lm| lm.to_point(scale, width, height))
    }

    /// Absolute delay between capture and landmark extraction, in seconds
    pub fn pose_latency(&self) -> f64 {
        timestamp::seconds_between(&self.image_timestamp, &self.pose_timestamp).abs()
    }
}

/// Pose record as published by the pose estimator on the `PoseData` topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosePayload {
    #[serde(rename = "Image_Timestamp")]
    pub image_timestamp: String,
    #[serde(rename = "Pose_Timestamp")]
    pub pose_timestamp: String,
    #[serde(rename = "MAX_Width")]
    pub max_width: u32,
    #[serde(rename = "MAX_Height")]
    pub max_height: u32,
    /// Flat `x0, y0, x1, y1, ...` sequence
    #[serde(rename = "Landmarks", default)]
    pub landmarks: Vec<f64>,
    /// Camera stream the frame belongs to
    #[serde(rename = "Stream_Id", default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

impl PosePayload {
    pub fn from_json(json: &str) -> Result<Self, InvalidFrameError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl TryFrom<PosePayload> for LandmarkFrame {
    type Error = InvalidFrameError;

    fn try_from(payload: PosePayload) -> Result<Self, Self::Error> {
        if payload.landmarks.is_empty() {
            return Err(InvalidFrameError::NoPoseDetected);
        }
        if payload.landmarks.len() % 2 != 0 {
            return Err(InvalidFrameError::OddCoordinateCount {
                values: payload.landmarks.len(),
            });
        }
        if payload.landmarks.len() != LANDMARK_COUNT * 2 {
            return Err(InvalidFrameError::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: payload.landmarks.len() / 2,
            });
        }

        let image_timestamp = timestamp::parse(&payload.image_timestamp)?;
        let pose_timestamp = timestamp::parse(&payload.pose_timestamp)?;
        let landmarks = payload
            .landmarks
            .chunks_exact(2)
            .map(|xy| Landmark::new(xy[0], xy[1]))
            .collect();

        LandmarkFrame::new(
            image_timestamp,
            pose_timestamp,
            payload.max_width,
            payload.max_height,
            landmarks,
        )
    }
}

impl From<&LandmarkFrame> for PosePayload {
    fn from(frame: &LandmarkFrame) -> Self {
        Self {
            image_timestamp: timestamp::format(&frame.image_timestamp),
            pose_timestamp: timestamp::format(&frame.pose_timestamp),
            max_width: frame.max_width,
            max_height: frame.max_height,
            landmarks: frame.landmarks.iter().flat_map(|lm| [lm.x, lm.y]).collect(),
            stream_id: None,
        }
    }
}

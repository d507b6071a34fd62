use chrono::NaiveDateTime;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Features derived from one pair of consecutive pose frames
///
/// Published on the `FeatureData` topic; immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Capture time of the later frame of the pair
    #[serde(rename = "Feature_Timestamp", with = "crate::models::timestamp")]
    pub timestamp: NaiveDateTime,

    /// Frames per second, or the constant 1 in fixed-unit mode
    #[serde(rename = "Frame_Rate")]
    pub frame_rate: f64,

    /// Nose to hip-midpoint angle from the horizontal, folded into [0, 90] degrees
    #[serde(rename = "CoG_Angle")]
    pub cog_angle: f64,

    /// Average skeleton-edge endpoint displacement per second
    #[serde(rename = "Movement_Rate")]
    pub movement_rate: f64,
}

impl FeatureRecord {
    /// Record with every feature forced to zero, used for skipped rows
    pub fn zeroed(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            frame_rate: 0.0,
            cog_angle: 0.0,
            movement_rate: 0.0,
        }
    }

    /// Column names in `to_ndarray` order
    pub fn feature_names() -> [&'static str; 3] {
        ["Frame_Rate", "CoG_Angle", "Movement_Rate"]
    }

    /// Convert to the feature vector used by the trainable classifiers
    pub fn to_ndarray(&self) -> Array1<f64> {
        Array1::from(vec![self.frame_rate, self.cog_angle, self.movement_rate])
    }
}

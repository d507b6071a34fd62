use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::ClassifierError;
use crate::models::FeatureRecord;

/// Stack feature records into an `n x 3` matrix in `FeatureRecord::to_ndarray` order
pub fn feature_matrix<'a, I>(records: I) -> Array2<f64>
where
    I: IntoIterator<Item = &'a FeatureRecord>,
{
    let flat: Vec<f64> = records
        .into_iter()
        .flat_map(|r| [r.frame_rate, r.cog_angle, r.movement_rate])
        .collect();
    let rows = flat.len() / 3;
    Array2::from_shape_vec((rows, 3), flat).unwrap_or_else(|_| Array2::zeros((0, 3)))
}

/// Feature standardization (zero mean, unit variance per column)
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScaler {
    pub means: Array1<f64>,
    pub stds: Array1<f64>,
}

impl FeatureScaler {
    /// Fit a scaler on training data; constant columns keep a unit std
    pub fn fit(features: &Array2<f64>) -> Result<Self, ClassifierError> {
        let means = features
            .mean_axis(Axis(0))
            .ok_or(ClassifierError::InsufficientData { needed: 1, got: 0 })?;
        let stds = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON && s.is_finite() { s } else { 1.0 });

        Ok(Self { means, stds })
    }

    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        (features - &self.means) / &self.stds
    }

    pub fn transform_single(&self, features: &Array1<f64>) -> Array1<f64> {
        (features - &self.means) / &self.stds
    }

    /// Map a standardized vector back to feature units
    pub fn inverse_single(&self, scaled: &Array1<f64>) -> Array1<f64> {
        scaled * &self.stds + &self.means
    }

    /// Mean of the frame-rate column, used to complete angle/rate queries
    pub fn frame_rate_mean(&self) -> f64 {
        self.means[0]
    }

    pub fn to_snapshot(&self) -> ScalerSnapshot {
        ScalerSnapshot {
            means: self.means.to_vec(),
            stds: self.stds.to_vec(),
        }
    }

    pub fn from_snapshot(snapshot: &ScalerSnapshot) -> Result<Self, ClassifierError> {
        if snapshot.means.len() != 3 || snapshot.stds.len() != 3 {
            return Err(ClassifierError::InvalidConfig(format!(
                "scaler snapshot needs 3 means and 3 stds, got {} and {}",
                snapshot.means.len(),
                snapshot.stds.len()
            )));
        }
        if snapshot.means.iter().any(|m| !m.is_finite()) {
            return Err(ClassifierError::InvalidConfig("scaler means must be finite".into()));
        }
        if snapshot.stds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ClassifierError::InvalidConfig(format!(
                "scaler stds must be finite and positive, got {:?}",
                snapshot.stds
            )));
        }
        Ok(Self {
            means: Array1::from(snapshot.means.clone()),
            stds: Array1::from(snapshot.stds.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerSnapshot {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_standardizes() {
        let data = array![[10.0, 0.0, 1.0], [20.0, 90.0, 3.0]];
        let scaler = FeatureScaler::fit(&data).unwrap();

        assert_eq!(scaler.means, array![15.0, 45.0, 2.0]);
        let scaled = scaler.transform(&data);
        assert!((scaled[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((scaled[[1, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_keeps_unit_std() {
        let data = array![[1.0, 5.0, 0.0], [1.0, 7.0, 0.0]];
        let scaler = FeatureScaler::fit(&data).unwrap();

        assert_eq!(scaler.stds[0], 1.0);
        assert_eq!(scaler.stds[2], 1.0);
        assert!(scaler.transform(&data).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_inverse_round_trip() {
        let data = array![[10.0, 20.0, 1.0], [30.0, 80.0, 9.0], [20.0, 50.0, 2.0]];
        let scaler = FeatureScaler::fit(&data).unwrap();
        let point = array![12.0, 61.0, 4.5];

        let back = scaler.inverse_single(&scaler.transform_single(&point));
        for (a, b) in back.iter().zip(point.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_data_is_rejected() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(FeatureScaler::fit(&empty).is_err());
    }

    #[test]
    fn test_feature_matrix_layout() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let records = vec![FeatureRecord {
            timestamp: ts,
            frame_rate: 30.0,
            cog_angle: 80.0,
            movement_rate: 0.5,
        }];
        assert_eq!(feature_matrix(&records), array![[30.0, 80.0, 0.5]]);
    }

    #[test]
    fn test_snapshot_validation() {
        let bad = ScalerSnapshot {
            means: vec![0.0; 2],
            stds: vec![1.0; 3],
        };
        assert!(FeatureScaler::from_snapshot(&bad).is_err());
    }

    #[test]
    fn test_snapshot_rejects_degenerate_stds() {
        for stds in [vec![0.0; 3], vec![1.0, -2.0, 1.0], vec![1.0, f64::NAN, 1.0]] {
            let snapshot = ScalerSnapshot {
                means: vec![10.0, 45.0, 5.0],
                stds,
            };
            assert!(matches!(
                FeatureScaler::from_snapshot(&snapshot),
                Err(ClassifierError::InvalidConfig(_))
            ));
        }

        let infinite_mean = ScalerSnapshot {
            means: vec![f64::INFINITY, 45.0, 5.0],
            stds: vec![1.0; 3],
        };
        assert!(FeatureScaler::from_snapshot(&infinite_mean).is_err());
    }
}

/// Movement classification from (CoG angle, movement rate) pairs
///
/// The rule table is an ordered list of bands; the first band containing the
/// pair wins and a pair matching no band is `Unclassified`. Every band is
/// half-open `[lo, hi)` on both axes, with open ends where a bound is absent.
///
/// `RestlessLying` has no band: the original rule set placed it on exactly the
/// same region as `LyingStill`, after it, so it could never match. It remains
/// a valid label for hand-labeled training data.

use serde::{Deserialize, Serialize};

use crate::errors::ClassifierError;
use crate::models::{FeatureRecord, MovementState};

/// Common interface of the rule-based and trainable classifiers
pub trait MovementClassifier: Send + Sync {
    /// Classify an angle/rate pair
    fn predict(&self, cog_angle: f64, movement_rate: f64) -> Result<MovementState, ClassifierError>;

    /// Classify a full feature record; trainable models use the frame rate too
    fn predict_record(&self, record: &FeatureRecord) -> Result<MovementState, ClassifierError> {
        self.predict(record.cog_angle, record.movement_rate)
    }

    fn name(&self) -> &'static str;
}

/// Fit-then-predict lifecycle shared by the trainable classifiers
#[derive(Debug, Clone)]
pub enum TrainingState<M> {
    Untrained,
    Trained(M),
}

impl<M> Default for TrainingState<M> {
    fn default() -> Self {
        TrainingState::Untrained
    }
}

impl<M> TrainingState<M> {
    pub fn model(&self) -> Result<&M, ClassifierError> {
        match self {
            TrainingState::Trained(model) => Ok(model),
            TrainingState::Untrained => Err(ClassifierError::ModelNotTrained),
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, TrainingState::Trained(_))
    }
}

/// Boundary constants of the rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Below this rate a person is considered motionless
    #[serde(default = "default_still_rate")]
    pub still_rate: f64,
    /// Upper bound of slow movement (lying, leaning)
    #[serde(default = "default_slow_rate")]
    pub slow_rate: f64,
    /// Upper bound of walking pace
    #[serde(default = "default_fast_rate")]
    pub fast_rate: f64,
    /// Below this angle the body is horizontal
    #[serde(default = "default_lying_angle")]
    pub lying_angle: f64,
    /// From this angle on the body is upright
    #[serde(default = "default_upright_angle")]
    pub upright_angle: f64,
}

fn default_still_rate() -> f64 {
    5.0
}

fn default_slow_rate() -> f64 {
    20.0
}

fn default_fast_rate() -> f64 {
    50.0
}

fn default_lying_angle() -> f64 {
    10.0
}

fn default_upright_angle() -> f64 {
    70.0
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            still_rate: default_still_rate(),
            slow_rate: default_slow_rate(),
            fast_rate: default_fast_rate(),
            lying_angle: default_lying_angle(),
            upright_angle: default_upright_angle(),
        }
    }
}

impl RuleThresholds {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        let ordered_rates = self.still_rate < self.slow_rate && self.slow_rate < self.fast_rate;
        let ordered_angles = self.lying_angle < self.upright_angle;
        if ordered_rates && ordered_angles {
            Ok(())
        } else {
            Err(ClassifierError::InvalidConfig(format!(
                "thresholds must be increasing: rates {}/{}/{}, angles {}/{}",
                self.still_rate, self.slow_rate, self.fast_rate, self.lying_angle, self.upright_angle
            )))
        }
    }
}

/// Half-open interval `[lo, hi)`; a missing bound is unbounded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

impl Band {
    pub fn below(hi: f64) -> Self {
        Self { lo: None, hi: Some(hi) }
    }

    pub fn between(lo: f64, hi: f64) -> Self {
        Self { lo: Some(lo), hi: Some(hi) }
    }

    pub fn at_least(lo: f64) -> Self {
        Self { lo: Some(lo), hi: None }
    }

    /// NaN is never contained
    pub fn contains(&self, value: f64) -> bool {
        !value.is_nan()
            && self.lo.map_or(true, |lo| value >= lo)
            && self.hi.map_or(true, |hi| value < hi)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleBand {
    pub state: MovementState,
    pub movement_rate: Band,
    pub cog_angle: Band,
}

/// Build the ordered rule table
pub fn rule_table(t: &RuleThresholds) -> Vec<RuleBand> {
    let band = |state, movement_rate, cog_angle| RuleBand {
        state,
        movement_rate,
        cog_angle,
    };

    vec![
        band(MovementState::Fallen, Band::below(t.still_rate), Band::below(t.lying_angle)),
        band(
            MovementState::LyingStill,
            Band::between(t.still_rate, t.slow_rate),
            Band::below(t.lying_angle),
        ),
        band(
            MovementState::AboutToFall,
            Band::between(t.still_rate, t.slow_rate),
            Band::between(t.lying_angle, t.upright_angle),
        ),
        band(
            MovementState::Walking,
            Band::between(t.slow_rate, t.fast_rate),
            Band::at_least(t.upright_angle),
        ),
        band(MovementState::Running, Band::at_least(t.fast_rate), Band::at_least(t.upright_angle)),
        band(
            MovementState::Crawling,
            Band::between(t.slow_rate, t.fast_rate),
            Band::below(t.lying_angle),
        ),
    ]
}

/// Fixed-threshold classifier; a pure function of its inputs
#[derive(Debug, Clone)]
pub struct RuleBasedClassifier {
    thresholds: RuleThresholds,
    bands: Vec<RuleBand>,
}

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self::from_table(RuleThresholds::default())
    }

    pub fn with_thresholds(thresholds: RuleThresholds) -> Result<Self, ClassifierError> {
        thresholds.validate()?;
        Ok(Self::from_table(thresholds))
    }

    fn from_table(thresholds: RuleThresholds) -> Self {
        let bands = rule_table(&thresholds);
        Self { thresholds, bands }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    pub fn bands(&self) -> &[RuleBand] {
        &self.bands
    }

    /// First matching band, or `Unclassified`
    pub fn classify(&self, cog_angle: f64, movement_rate: f64) -> MovementState {
        self.bands
            .iter()
            .find(|band| band.movement_rate.contains(movement_rate) && band.cog_angle.contains(cog_angle))
            .map(|band| band.state)
            .unwrap_or(MovementState::Unclassified)
    }
}

impl Default for RuleBasedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementClassifier for RuleBasedClassifier {
    fn predict(&self, cog_angle: f64, movement_rate: f64) -> Result<MovementState, ClassifierError> {
        Ok(self.classify(cog_angle, movement_rate))
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

use anyhow::{anyhow, Context, Result};
use std::env;

use crate::models::CoordinateScale;
use crate::services::feature_extractor::{ExtractorConfig, FrameRateMode};
use crate::services::movement_classifier::RuleThresholds;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub coordinate_scale: CoordinateScale,
    pub frame_rate_mode: FrameRateMode,
    pub frame_rate_threshold: Option<f64>,
    pub log_level: String,
    pub thresholds: RuleThresholds,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            coordinate_scale: CoordinateScale::Normalized,
            frame_rate_mode: FrameRateMode::MachineClock,
            frame_rate_threshold: None,
            log_level: "info".to_string(),
            thresholds: RuleThresholds::default(),
        }
    }
}

fn parse_scale(value: &str) -> Result<CoordinateScale> {
    match value.trim().to_ascii_lowercase().as_str() {
        "normalized" => Ok(CoordinateScale::Normalized),
        "real" | "real_scale" => Ok(CoordinateScale::RealScale),
        other => Err(anyhow!("unknown coordinate scale '{}'", other)),
    }
}

fn parse_mode(value: &str) -> Result<FrameRateMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "machine" | "machine_clock" => Ok(FrameRateMode::MachineClock),
        "fixed" | "fixed_unit" => Ok(FrameRateMode::FixedUnit),
        other => Err(anyhow!("unknown frame rate mode '{}'", other)),
    }
}

fn env_f64(name: &str, default: f64) -> Result<f64> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, value)),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let coordinate_scale = match env::var("FALL_COORDINATE_SCALE") {
            Ok(value) => parse_scale(&value).context("FALL_COORDINATE_SCALE")?,
            Err(_) => CoordinateScale::Normalized,
        };
        let frame_rate_mode = match env::var("FALL_FRAME_RATE_MODE") {
            Ok(value) => parse_mode(&value).context("FALL_FRAME_RATE_MODE")?,
            Err(_) => FrameRateMode::MachineClock,
        };
        let frame_rate_threshold = match env::var("FALL_FRAME_RATE_THRESHOLD") {
            Ok(value) => Some(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("FALL_FRAME_RATE_THRESHOLD must be a number, got '{}'", value))?,
            ),
            Err(_) => None,
        };
        let log_level = Self::log_level_from_env();

        let defaults = RuleThresholds::default();
        let thresholds = RuleThresholds {
            still_rate: env_f64("FALL_STILL_RATE", defaults.still_rate)?,
            slow_rate: env_f64("FALL_SLOW_RATE", defaults.slow_rate)?,
            fast_rate: env_f64("FALL_FAST_RATE", defaults.fast_rate)?,
            lying_angle: env_f64("FALL_LYING_ANGLE", defaults.lying_angle)?,
            upright_angle: env_f64("FALL_UPRIGHT_ANGLE", defaults.upright_angle)?,
        };
        thresholds.validate()?;

        Ok(AppConfig {
            coordinate_scale,
            frame_rate_mode,
            frame_rate_threshold,
            log_level,
            thresholds,
        })
    }

    /// `FALL_LOG_LEVEL` as a tracing filter directive, `info` when unset or blank.
    ///
    /// Readable on its own so logging can start before the rest of the
    /// configuration is validated.
    pub fn log_level_from_env() -> String {
        env::var("FALL_LOG_LEVEL")
            .ok()
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            coordinate_scale: self.coordinate_scale,
            frame_rate_mode: self.frame_rate_mode,
            frame_rate_threshold: self.frame_rate_threshold,
        }
    }
}

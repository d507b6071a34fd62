use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use fall_detection::config::AppConfig;
use fall_detection::services::{ClusterConfig, ExtractorConfig, PropagationConfig, RuleThresholds, TreeConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub thresholds: RuleThresholds,

    #[serde(default)]
    pub clustering: ClusterConfig,

    #[serde(default)]
    pub propagation: PropagationConfig,

    #[serde(default)]
    pub tree: TreeConfig,
}

impl Config {
    /// Get config directory path (~/.fall-detection/)
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".fall-detection"))
    }

    /// Get config file path (~/.fall-detection/config.toml)
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Extractor and threshold settings from `FALL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig::from_env()?;
        Ok(Self {
            extractor: app.extractor_config(),
            thresholds: app.thresholds,
            ..Self::default()
        })
    }

    /// Load configuration from `path`, or the default location.
    ///
    /// Without a config file the environment decides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_file = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_file()?,
        };

        if !config_file.exists() {
            tracing::debug!("Config file {} not found, using environment", config_file.display());
            return Self::from_env();
        }

        let contents = fs::read_to_string(&config_file)
            .with_context(|| format!("Failed to read config file {}", config_file.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config file")?;
        config.thresholds.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_file = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_file()?,
        };
        if let Some(dir) = config_file.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_file, contents).context("Failed to write config file")?;

        Ok(config_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fall_detection::models::CoordinateScale;
    use fall_detection::services::FrameRateMode;

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized = Config::parse(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [extractor]
            coordinate_scale = "real"
            frame_rate_mode = "fixed"

            [thresholds]
            lying_angle = 12.5

            [clustering]
            n_clusters = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.extractor.coordinate_scale, CoordinateScale::RealScale);
        assert_eq!(config.extractor.frame_rate_mode, FrameRateMode::FixedUnit);
        assert_eq!(config.thresholds.lying_angle, 12.5);
        assert_eq!(config.thresholds.still_rate, 5.0);
        assert_eq!(config.clustering.n_clusters, Some(4));
        assert_eq!(config.clustering.max_clusters, 10);
        assert_eq!(config.propagation.n_neighbors, 9);
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let result = Config::parse("[thresholds]\nstill_rate = 40.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.propagation.n_neighbors = 5;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.propagation.n_neighbors, 5);
    }
}

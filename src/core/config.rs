use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::smoothing::{DEFAULT_POLYORDER, DEFAULT_WINDOW};
use crate::models::check::{ExerciseType, Side};
use crate::models::pose::PoseConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Exercise to evaluate
    pub exercise_type: ExerciseType,
    /// Arm to evaluate for single-arm checks
    pub side: Side,
    /// Savitzky-Golay window length (even values are bumped to the next odd)
    pub smoothing_window: usize,
    /// Savitzky-Golay polynomial order
    pub smoothing_polyorder: usize,
    /// Log progress every N frames
    pub progress_interval: u64,
    /// Worker tasks for frame evaluation (1 = sequential)
    pub parallel_workers: usize,
    /// Record runs in the tracking database
    pub tracking_enabled: bool,
    /// Where the tracking database lives
    pub tracking_db_path: PathBuf,
    /// Pose backend settings
    pub pose: PoseConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut tracking_db_path = Self::data_dir().unwrap_or_else(|_| PathBuf::from(".form_check"));
        tracking_db_path.push("tracking");
        tracking_db_path.push("runs.db");

        Self {
            exercise_type: ExerciseType::BicepCurl,
            side: Side::Left,
            smoothing_window: DEFAULT_WINDOW,
            smoothing_polyorder: DEFAULT_POLYORDER,
            progress_interval: 30,
            parallel_workers: 1,
            tracking_enabled: false,
            tracking_db_path,
            pose: PoseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating it with defaults if it doesn't exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smoothing_window == 0 || self.smoothing_window > 101 {
            return Err(ConfigError::Invalid(format!(
                "Invalid smoothing window: {}. Must be between 1 and 101",
                self.smoothing_window
            )));
        }

        let odd_window = self.smoothing_window | 1;
        if self.smoothing_polyorder >= odd_window {
            return Err(ConfigError::Invalid(format!(
                "Invalid smoothing polyorder: {}. Must be less than the window length {}",
                self.smoothing_polyorder, odd_window
            )));
        }

        if self.progress_interval == 0 {
            return Err(ConfigError::Invalid(
                "Progress interval must be at least 1 frame".to_string(),
            ));
        }

        if self.parallel_workers == 0 || self.parallel_workers > 64 {
            return Err(ConfigError::Invalid(format!(
                "Invalid worker count: {}. Must be between 1 and 64",
                self.parallel_workers
            )));
        }

        if !(0.0..=1.0).contains(&self.pose.min_detection_confidence) {
            return Err(ConfigError::Invalid(format!(
                "Invalid detection confidence: {}. Must be between 0.0 and 1.0",
                self.pose.min_detection_confidence
            )));
        }

        if !(0.0..=1.0).contains(&self.pose.min_tracking_confidence) {
            return Err(ConfigError::Invalid(format!(
                "Invalid tracking confidence: {}. Must be between 0.0 and 1.0",
                self.pose.min_tracking_confidence
            )));
        }

        Ok(())
    }

    /// Reset the file at `path` to the default configuration
    pub fn reset(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Default configuration file path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = Self::data_dir()?;
        path.push("config");
        path.push("settings.json");
        Ok(path)
    }

    fn data_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDir)?;

        let mut path = PathBuf::from(home);
        path.push(".form_check");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.exercise_type, ExerciseType::BicepCurl);
        assert_eq!(config.side, Side::Left);
        assert_eq!(config.smoothing_window, 5);
        assert_eq!(config.smoothing_polyorder, 2);
        assert_eq!(config.progress_interval, 30);
        assert_eq!(config.parallel_workers, 1);
        assert!(!config.tracking_enabled);
        assert!(config.tracking_db_path.ends_with("tracking/runs.db"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        assert!(config.validate().is_ok());

        config.smoothing_window = 0;
        assert!(config.validate().is_err());
        config.smoothing_window = 4;
        config.smoothing_polyorder = 4;
        // Window 4 becomes 5, so order 4 is still allowed
        assert!(config.validate().is_ok());
        config.smoothing_polyorder = 5;
        assert!(config.validate().is_err());
        config.smoothing_window = 5;
        config.smoothing_polyorder = 2;

        config.parallel_workers = 0;
        assert!(config.validate().is_err());
        config.parallel_workers = 65;
        assert!(config.validate().is_err());
        config.parallel_workers = 4;

        config.progress_interval = 0;
        assert!(config.validate().is_err());
        config.progress_interval = 10;

        config.pose.min_detection_confidence = 1.5;
        assert!(config.validate().is_err());
        config.pose.min_detection_confidence = 0.5;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"exercise_type\":\"bicep_curl\""));
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_load_creates_default_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let created = Config::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, Config::default());

        let mut changed = created.clone();
        changed.side = Side::Right;
        changed.exercise_type = ExerciseType::LateralRaise;
        changed.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), changed);

        let reset = Config::reset(&path).unwrap();
        assert_eq!(reset, Config::default());
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut config = Config::default();
        config.parallel_workers = 0;
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Json(_))));
    }
}

//! Configuration
//!
//! Detector tuning and on-disk locations. Everything has a default, so an empty
//! JSON object is a valid configuration file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TallyError;

/// Default magnitude a sample must exceed to count as a step
pub const DEFAULT_THRESHOLD: f64 = 12.5;

/// Default minimum interval between accepted steps (ms)
pub const DEFAULT_COOLDOWN_MS: i64 = 300;

/// Default database file name inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "steps.db";

/// Default running count file name inside the data directory
pub const DEFAULT_PREFS_FILE: &str = "running.json";

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = ".steptally";

/// Step detector tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Magnitude threshold in sensor units (uncalibrated for gravity)
    pub threshold: f64,
    /// Minimum elapsed time between two accepted steps (ms)
    pub cooldown_ms: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), TallyError> {
        if !self.threshold.is_finite() {
            return Err(TallyError::Config(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if self.cooldown_ms < 0 {
            return Err(TallyError::Config(format!(
                "cooldown_ms must not be negative, got {}",
                self.cooldown_ms
            )));
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub detector: DetectorConfig,
    /// Directory holding the database and running count file
    pub data_dir: PathBuf,
    pub database_file: String,
    pub prefs_file: String,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            prefs_file: DEFAULT_PREFS_FILE.to_string(),
        }
    }
}

impl TallyConfig {
    /// Parse configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, TallyError> {
        let config: Self = serde_json::from_str(json)?;
        config.detector.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, TallyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, TallyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.data_dir.join(&self.prefs_file)
    }
}

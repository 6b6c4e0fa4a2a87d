//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::DEFAULT_SIMILARITY_THRESHOLD;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables of the statistics engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsConfig {
    /// Minimum normalized Levenshtein similarity for name suggestions, in `[0, 1]`
    pub similarity_threshold: f64,
    /// Cap on the number of name suggestions returned
    pub max_suggestions: Option<usize>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_suggestions: None,
        }
    }
}

impl StatsConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Invalid(format!(
                "similarityThreshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_suggestions == Some(0) {
            return Err(ConfigError::Invalid(
                "maxSuggestions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

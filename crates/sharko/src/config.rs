//! Runtime configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sharko_core::{Error, Result};
use tracing::debug;

use crate::batch::BatchConfig;
use crate::encoder::{FeatureEncoder, DEFAULT_DAY_PERIOD};
use crate::registry::LATEST_VERSION;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Sharko configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharkoConfig {
    /// Root of the model store (`<model_dir>/<version>/<stage>.json`)
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Model version directory, or `latest`
    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Period of the day-of-year encoding, in days
    #[serde(default = "default_day_period")]
    pub day_period: f64,

    /// Batch worker threads (0 = one per core)
    #[serde(default)]
    pub num_workers: usize,

    /// Minimum points per worker task
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Show a progress bar during batches
    #[serde(default)]
    pub show_progress: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SharkoConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            model_version: default_model_version(),
            day_period: default_day_period(),
            num_workers: 0,
            chunk_size: default_chunk_size(),
            show_progress: false,
            log_level: default_log_level(),
        }
    }
}

impl SharkoConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check field values.
    pub fn validate(&self) -> Result<()> {
        if self.model_version.trim().is_empty() {
            return Err(Error::InvalidConfig("model version is empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be at least 1".into()));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(Error::InvalidConfig(format!(
                "unknown log level {:?}",
                self.log_level
            )));
        }
        FeatureEncoder::with_period(self.day_period)?;
        Ok(())
    }

    /// Feature encoder for this configuration.
    pub fn encoder(&self) -> Result<FeatureEncoder> {
        FeatureEncoder::with_period(self.day_period)
    }

    /// Batch settings for this configuration.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            num_workers: self.num_workers,
            chunk_size: self.chunk_size,
            show_progress: self.show_progress,
        }
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_model_version() -> String {
    LATEST_VERSION.to_string()
}

fn default_day_period() -> f64 {
    DEFAULT_DAY_PERIOD
}

fn default_chunk_size() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

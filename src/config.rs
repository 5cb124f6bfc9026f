//! Pipeline configuration, loaded from a JSON file. Every field has a default,
//! so an empty object `{}` is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::emg::filter::{FilterConfig, FilterDesignError};
use crate::kernel::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid EMG filter: {0}")]
    Filter(#[from] FilterDesignError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmgConfig {
    pub sample_rate_hz: f64,
    pub filter: FilterConfig,
    /// Upper bound on one blocking driver poll.
    pub poll_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for EmgConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 200.0,
            filter: FilterConfig::default(),
            poll_timeout_ms: 100,
            retry: RetryPolicy::default(),
        }
    }
}

impl EmgConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub jpeg_quality: u8,
    pub retry: RetryPolicy,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Session files go to `<data_root>/raw/<subject_id>/`.
    pub data_root: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub emg: EmgConfig,
    pub camera: CameraConfig,
    pub recording: RecordingConfig,
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.emg.filter.validate(self.emg.sample_rate_hz)?;
        for (name, retry) in [("emg", &self.emg.retry), ("camera", &self.camera.retry)] {
            if retry.max_retries == 0 {
                return Err(ConfigError::Invalid(format!("{}.retry.max_retries must be at least 1", name)));
            }
        }
        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "camera.jpeg_quality must be within 1..=100, got {}",
                self.camera.jpeg_quality
            )));
        }
        Ok(())
    }
}

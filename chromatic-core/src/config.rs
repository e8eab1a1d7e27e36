//! Session configuration.
//!
//! Every field has a default, so a JSON document only needs the values it
//! overrides:
//!
//! ```
//! use chromatic_core::config::SessionConfig;
//!
//! let config = SessionConfig::from_json(r#"{ "window_size": 2048, "algorithm": "MPM" }"#).unwrap();
//! assert_eq!(config.window_size, 2048);
//! assert_eq!(config.publish_interval_ms, 200);
//! ```

use crate::error::{Error, Result};
use crate::pitch::{Algorithm, FrequencyRange, MpmConfig, YinConfig};
use crate::tuning::TuningStandard;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest window a detector can interpolate within.
const MIN_WINDOW_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Samples per analysis window.
    pub window_size: usize,
    /// Minimum time between two published readings.
    pub publish_interval_ms: u64,
    /// Capacity of the chunk queue between the audio source and the analysis worker.
    pub chunk_queue: usize,
    pub yin: YinConfig,
    pub mpm: MpmConfig,
    pub frequency_range: FrequencyRange,
    /// Initial tuning standard.
    pub tuning: TuningStandard,
    /// Initial algorithm.
    pub algorithm: Algorithm,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: 4096,
            publish_interval_ms: 200,
            chunk_queue: 32,
            yin: YinConfig::default(),
            mpm: MpmConfig::default(),
            frequency_range: FrequencyRange::default(),
            tuning: TuningStandard::default(),
            algorithm: Algorithm::default(),
        }
    }
}

impl SessionConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(Error::InvalidConfig(format!(
                "window_size must be at least {MIN_WINDOW_SIZE}, got {}",
                self.window_size
            )));
        }
        if !self.window_size.is_power_of_two() {
            tracing::warn!(
                window_size = self.window_size,
                "window size is not a power of two"
            );
        }
        if self.chunk_queue == 0 {
            return Err(Error::InvalidConfig("chunk_queue must not be zero".into()));
        }
        unit_interval("yin.threshold", self.yin.threshold)?;
        unit_interval("mpm.cutoff", self.mpm.cutoff)?;
        unit_interval("mpm.clarity_threshold", self.mpm.clarity_threshold)?;
        self.frequency_range.validate()?;
        self.tuning.validate()?;
        Ok(())
    }
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::fallback::FallbackConfig;
use super::scoring::AggregatorConfig;
use crate::core::video::SamplerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub sampler: SamplerConfig,
    pub aggregator: AggregatorConfig,
    pub fallback: FallbackConfig,
    /// Classify sampled frames concurrently on a rayon pool.
    pub parallel_classification: bool,
    /// Pool size for parallel classification; 0 picks from the CPU count.
    pub classification_threads: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            aggregator: AggregatorConfig::default(),
            fallback: FallbackConfig::default(),
            parallel_classification: false,
            classification_threads: 0,
        }
    }
}

impl DetectorConfig {
    /// Fewer frames, no artificial fallback delays, parallel classification.
    pub fn fast() -> Self {
        Self {
            sampler: SamplerConfig {
                frame_count: 5,
                timeout_ms: 5_000,
            },
            fallback: FallbackConfig::instant(),
            parallel_classification: true,
            ..Default::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: DetectorConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.frame_count == 0 {
            return Err(ConfigError::Invalid("sampler.frame_count must be > 0".into()));
        }
        let weights = &self.aggregator.feature_weights;
        for weight in [
            weights.face_inconsistencies,
            weights.audio_visual_sync,
            weights.texture_anomalies,
            weights.unnatural_eye_blinking,
            weights.unnatural_movements,
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "feature weight {} must be a non-negative number",
                    weight
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn thread_count(&self) -> usize {
        if self.classification_threads > 0 {
            self.classification_threads
        } else {
            num_cpus::get().min(4)
        }
    }
}

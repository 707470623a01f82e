use std::path::PathBuf;

use thiserror::Error;

use crate::core::classifier::ClassifierError;
use crate::core::video::FrameExtractionError;

/// Failure taxonomy of a detection run. Everything except
/// `FallbackExhausted` is absorbed by the pipeline and turned into a
/// fallback result.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Classifier load failed: {0}")]
    ClassifierLoad(#[source] ClassifierError),
    #[error("Frame extraction failed: {0}")]
    FrameExtraction(#[from] FrameExtractionError),
    #[error("No predictions from {frames} frames ({failed} failed)")]
    NoPredictions { frames: usize, failed: usize },
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
    #[error("Fallback analysis could not run: {0}")]
    FallbackExhausted(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

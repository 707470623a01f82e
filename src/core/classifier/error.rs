use thiserror::Error;

use crate::core::video::VideoError;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model load failed: {0}")]
    LoadFailed(String),
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),
    #[error("Frame encoding failed: {0}")]
    Frame(#[from] VideoError),
}

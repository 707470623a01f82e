use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`VideoSource`](super::VideoSource) implementation.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Video file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("No video stream found")]
    NoVideoStream,
    #[error("Probe failed: {0}")]
    ProbeFailed(String),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Seek to {position:?} is beyond the video duration ({duration_secs:.3}s)")]
    SeekOutOfRange { position: Duration, duration_secs: f64 },
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),
    #[error("Video source already released")]
    Released,
    #[error("Capture did not finish before its deadline")]
    DeadlineExceeded,
}

/// Frame sampling failures. Any of these routes the pipeline to fallback.
#[derive(Debug, Error)]
pub enum FrameExtractionError {
    #[error("Failed to read video metadata: {0}")]
    Metadata(#[source] VideoError),
    #[error("Invalid video duration: {0}")]
    InvalidDuration(f64),
    #[error("Failed to capture frame {index}: {source}")]
    Capture {
        index: usize,
        #[source]
        source: VideoError,
    },
    #[error("No frame produced within {0:?}")]
    Timeout(Duration),
    #[error("No frames extracted")]
    Empty,
}

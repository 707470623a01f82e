//! 帧分类器适配层
//!
//! The pipeline only sees [`FrameClassifier`] (one-time `load`) and the
//! [`LoadedClassifier`] handle it returns (per-frame `classify`). Concrete
//! integrations plug in behind these two traits.

pub mod error;
pub mod luma;
pub mod mock;
pub mod remote;

use serde::{Deserialize, Serialize};

use crate::core::video::Frame;

pub use error::ClassifierError;
pub use luma::LumaStatsClassifier;
pub use mock::MockClassifier;
pub use remote::{RemoteClassifier, RemoteClassifierConfig};

/// One label with its probability, as produced by an image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Classifier output for one sampled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub frame_index: usize,
    pub labels: Vec<LabelScore>,
}

impl Prediction {
    pub fn top(&self) -> Option<&LabelScore> {
        self.labels
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

pub trait FrameClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Performs the slow one-time initialization and returns a handle owned
    /// by a single analysis run.
    fn load(&self) -> Result<Box<dyn LoadedClassifier>, ClassifierError>;
}

pub trait LoadedClassifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Result<Vec<LabelScore>, ClassifierError>;
}

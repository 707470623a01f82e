use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{ClassifierError, FrameClassifier, LabelScore, LoadedClassifier};
use crate::core::video::Frame;

/// Scriptable classifier for tests and demos.
pub struct MockClassifier {
    load_error: Option<String>,
    labels: Vec<LabelScore>,
    failing_frames: Vec<u64>,
    empty_frames: Vec<u64>,
    panic_frames: Vec<u64>,
    load_count: Arc<AtomicUsize>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            load_error: None,
            labels: vec![LabelScore::new("real", 0.9), LabelScore::new("fake", 0.1)],
            failing_frames: Vec::new(),
            empty_frames: Vec::new(),
            panic_frames: Vec::new(),
            load_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_labels(mut self, labels: Vec<LabelScore>) -> Self {
        self.labels = labels;
        self
    }

    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    pub fn with_failing_frames(mut self, frames: Vec<u64>) -> Self {
        self.failing_frames = frames;
        self
    }

    /// Frames for which the classifier returns no labels at all.
    pub fn with_empty_frames(mut self, frames: Vec<u64>) -> Self {
        self.empty_frames = frames;
        self
    }

    pub fn with_panic_frames(mut self, frames: Vec<u64>) -> Self {
        self.panic_frames = frames;
        self
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClassifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    fn load(&self) -> Result<Box<dyn LoadedClassifier>, ClassifierError> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.load_error {
            return Err(ClassifierError::LoadFailed(message.clone()));
        }
        Ok(Box::new(MockHandle {
            labels: self.labels.clone(),
            failing_frames: self.failing_frames.clone(),
            empty_frames: self.empty_frames.clone(),
            panic_frames: self.panic_frames.clone(),
        }))
    }
}

struct MockHandle {
    labels: Vec<LabelScore>,
    failing_frames: Vec<u64>,
    empty_frames: Vec<u64>,
    panic_frames: Vec<u64>,
}

impl LoadedClassifier for MockHandle {
    fn classify(&self, frame: &Frame) -> Result<Vec<LabelScore>, ClassifierError> {
        if self.panic_frames.contains(&frame.frame_number) {
            panic!("mock classifier crashed on frame {}", frame.frame_number);
        }
        if self.failing_frames.contains(&frame.frame_number) {
            return Err(ClassifierError::ClassificationFailed(format!(
                "mock failure on frame {}",
                frame.frame_number
            )));
        }
        if self.empty_frames.contains(&frame.frame_number) {
            return Ok(Vec::new());
        }
        Ok(self.labels.clone())
    }
}

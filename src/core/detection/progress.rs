use log::trace;

pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_CLASSIFIER_READY: u8 = 30;
pub const PROGRESS_FRAMES_EXTRACTED: u8 = 50;
pub const PROGRESS_CLASSIFIED: u8 = 90;
pub const PROGRESS_DONE: u8 = 100;

/// Progress value after `done` of `total` frames have been classified.
pub fn classification_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_CLASSIFIED;
    }
    let span = (PROGRESS_CLASSIFIED - PROGRESS_FRAMES_EXTRACTED) as usize;
    PROGRESS_FRAMES_EXTRACTED + (done.min(total) * span / total) as u8
}

/// Forwards progress to the observer, suppressing any value lower than one
/// already reported so the observed sequence never decreases.
///
/// The observer runs synchronously on the pipeline's thread.
pub struct ProgressTracker<'a> {
    callback: Option<&'a mut dyn FnMut(u8)>,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(callback: Option<&'a mut dyn FnMut(u8)>) -> Self {
        Self {
            callback,
            last: None,
        }
    }

    pub fn with_callback(callback: &'a mut dyn FnMut(u8)) -> Self {
        Self::new(Some(callback))
    }

    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn report(&mut self, value: u8) {
        let value = value.min(PROGRESS_DONE);
        if let Some(last) = self.last {
            if value <= last {
                trace!("progress {} suppressed (at {})", value, last);
                return;
            }
        }
        self.last = Some(value);
        if let Some(callback) = self.callback.as_mut() {
            callback(value);
        }
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_non_decreasing() {
        let mut seen = Vec::new();
        let mut callback = |p: u8| seen.push(p);
        let mut tracker = ProgressTracker::with_callback(&mut callback);

        for value in [10, 30, 10, 30, 50, 75, 60, 95, 100, 100] {
            tracker.report(value);
        }
        assert_eq!(tracker.last(), Some(100));
        drop(tracker);

        assert_eq!(seen, vec![10, 30, 50, 75, 95, 100]);
    }

    #[test]
    fn test_values_clamped_to_hundred() {
        let mut tracker = ProgressTracker::silent();
        tracker.report(250);
        assert_eq!(tracker.last(), Some(100));
    }

    #[test]
    fn test_classification_progress_spans_fifty_to_ninety() {
        assert_eq!(classification_progress(0, 10), 50);
        assert_eq!(classification_progress(1, 10), 54);
        assert_eq!(classification_progress(10, 10), 90);
        assert_eq!(classification_progress(1, 3), 63);
        assert_eq!(classification_progress(0, 0), 90);
    }
}

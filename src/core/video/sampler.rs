use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::error::{FrameExtractionError, VideoError};
use super::frame::Frame;
use super::source::VideoSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of evenly spaced frames to capture.
    pub frame_count: usize,
    /// Bound on the wait for the first frame, measured from the start of extraction.
    pub timeout_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frame_count: 10,
            timeout_ms: 10_000,
        }
    }
}

impl SamplerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 均匀时间间隔抽帧
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::with_config(SamplerConfig::default())
    }

    pub fn with_config(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Captures `frame_count` frames at multiples of `duration / frame_count`,
    /// in order. The source is released on every exit path.
    pub fn extract_frames(
        &self,
        source: &mut dyn VideoSource,
    ) -> Result<Vec<Frame>, FrameExtractionError> {
        let started = Instant::now();
        let timeout = self.config.timeout();
        let frame_count = self.config.frame_count;

        let mut source = scopeguard::guard(source, |source| source.release());

        let metadata = source
            .metadata()
            .map_err(FrameExtractionError::Metadata)?;

        if !metadata.duration_secs.is_finite()
            || metadata.duration_secs <= 0.0
            || Duration::try_from_secs_f64(metadata.duration_secs).is_err()
        {
            return Err(FrameExtractionError::InvalidDuration(metadata.duration_secs));
        }
        if frame_count == 0 {
            return Err(FrameExtractionError::Empty);
        }

        let step = metadata.duration_secs / frame_count as f64;
        info!(
            "🎬 Sampling {} frames from {:.2}s video ({}x{}), step {:.3}s",
            frame_count, metadata.duration_secs, metadata.width, metadata.height, step
        );

        let deadline = started.checked_add(timeout);
        let mut frames: Vec<Frame> = Vec::with_capacity(frame_count);
        for index in 0..frame_count {
            let position = Duration::try_from_secs_f64(step * index as f64)
                .map_err(|_| FrameExtractionError::InvalidDuration(metadata.duration_secs))?;

            // 只有在尚未得到任何帧时才受超时约束
            let frame_deadline = if frames.is_empty() { deadline } else { None };
            let mut frame = match source.seek_and_capture(position, frame_deadline) {
                Ok(frame) => frame,
                Err(VideoError::DeadlineExceeded) => {
                    warn!("Frame sampling timed out after {:?}", started.elapsed());
                    return Err(FrameExtractionError::Timeout(timeout));
                }
                Err(err) => return Err(FrameExtractionError::Capture { index, source: err }),
            };

            if frames.is_empty() && started.elapsed() > timeout {
                warn!("First frame arrived after {:?}", started.elapsed());
                return Err(FrameExtractionError::Timeout(timeout));
            }

            if frame.width != metadata.width || frame.height != metadata.height {
                warn!(
                    "Frame {} is {}x{}, stream reports {}x{}",
                    index, frame.width, frame.height, metadata.width, metadata.height
                );
            }

            frame.frame_number = index as u64;
            debug!("Captured frame {} at {:?}", index, frame.timestamp);
            frames.push(frame);
        }

        if frames.is_empty() {
            return Err(FrameExtractionError::Empty);
        }

        debug!("Sampled {} frames in {:?}", frames.len(), started.elapsed());
        Ok(frames)
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::source::{DecodedVideo, VideoMetadata};

    fn create_test_video(duration_secs: f64, fps: u64) -> DecodedVideo {
        let count = (duration_secs * fps as f64) as u64;
        let frames = (0..count)
            .map(|i| Frame::new(16, 9, vec![(i % 255) as u8; 16 * 9 * 4], i * 1000 / fps, i))
            .collect();
        DecodedVideo::new(frames, duration_secs).unwrap()
    }

    /// Source that records release calls and can be scripted to fail or stall.
    struct ScriptedSource {
        duration_secs: f64,
        fail_metadata: bool,
        fail_at: Option<usize>,
        stall: Duration,
        captures: usize,
        released: usize,
    }

    impl ScriptedSource {
        fn new(duration_secs: f64) -> Self {
            Self {
                duration_secs,
                fail_metadata: false,
                fail_at: None,
                stall: Duration::ZERO,
                captures: 0,
                released: 0,
            }
        }
    }

    impl VideoSource for ScriptedSource {
        fn metadata(&mut self) -> Result<VideoMetadata, VideoError> {
            if self.fail_metadata {
                return Err(VideoError::ProbeFailed("unreadable".into()));
            }
            Ok(VideoMetadata {
                duration_secs: self.duration_secs,
                width: 4,
                height: 4,
            })
        }

        /// Stalls like a seek that never signals, but gives up at the deadline.
        fn seek_and_capture(
            &mut self,
            position: Duration,
            deadline: Option<Instant>,
        ) -> Result<Frame, VideoError> {
            if self.fail_at == Some(self.captures) {
                return Err(VideoError::DecodeFailed("corrupt packet".into()));
            }
            let wake = Instant::now() + self.stall;
            match deadline {
                Some(deadline) if deadline < wake => {
                    std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    return Err(VideoError::DeadlineExceeded);
                }
                _ => std::thread::sleep(self.stall),
            }
            self.captures += 1;
            Frame::from_rgba(4, 4, vec![0; 64], position)
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    #[test]
    fn test_ten_second_video_yields_ten_frames_one_second_apart() {
        let sampler = FrameSampler::new();
        let mut video = create_test_video(10.0, 30);

        let frames = sampler.extract_frames(&mut video).unwrap();

        assert_eq!(frames.len(), 10);
        for (i, pair) in frames.windows(2).enumerate() {
            let gap = pair[1].timestamp_ms() as i64 - pair[0].timestamp_ms() as i64;
            assert!((gap - 1000).abs() <= 40, "gap {} at {}", gap, i);
        }
        assert_eq!(frames[9].frame_number, 9);
        assert!(video.is_released());
    }

    #[test]
    fn test_zero_duration_fails_and_releases() {
        let sampler = FrameSampler::new();
        let mut source = ScriptedSource::new(0.0);

        let err = sampler.extract_frames(&mut source).unwrap_err();
        assert!(matches!(err, FrameExtractionError::InvalidDuration(_)));
        assert_eq!(source.released, 1);
    }

    #[test]
    fn test_nan_duration_rejected() {
        let sampler = FrameSampler::new();
        let mut source = ScriptedSource::new(f64::NAN);
        assert!(matches!(
            sampler.extract_frames(&mut source),
            Err(FrameExtractionError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_unreadable_metadata() {
        let sampler = FrameSampler::new();
        let mut source = ScriptedSource::new(5.0);
        source.fail_metadata = true;

        let err = sampler.extract_frames(&mut source).unwrap_err();
        assert!(matches!(err, FrameExtractionError::Metadata(_)));
        assert_eq!(source.released, 1);
    }

    #[test]
    fn test_capture_error_reports_index() {
        let sampler = FrameSampler::new();
        let mut source = ScriptedSource::new(5.0);
        source.fail_at = Some(3);

        match sampler.extract_frames(&mut source) {
            Err(FrameExtractionError::Capture { index, .. }) => assert_eq!(index, 3),
            other => panic!("unexpected result: {:?}", other.map(|f| f.len())),
        }
        assert_eq!(source.released, 1);
    }

    #[test]
    fn test_timeout_when_first_frame_is_late() {
        let sampler = FrameSampler::with_config(SamplerConfig {
            frame_count: 3,
            timeout_ms: 5,
        });
        let mut source = ScriptedSource::new(3.0);
        source.stall = Duration::from_millis(30);

        let err = sampler.extract_frames(&mut source).unwrap_err();
        assert!(matches!(err, FrameExtractionError::Timeout(_)));
        assert_eq!(source.released, 1);
    }

    #[test]
    fn test_stalled_seek_is_bounded_by_timeout() {
        let sampler = FrameSampler::with_config(SamplerConfig {
            frame_count: 3,
            timeout_ms: 50,
        });
        let mut source = ScriptedSource::new(3.0);
        source.stall = Duration::from_millis(1500);

        let started = Instant::now();
        let err = sampler.extract_frames(&mut source).unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, FrameExtractionError::Timeout(_)));
        assert!(elapsed < Duration::from_millis(500), "waited {:?}", elapsed);
        assert_eq!(source.captures, 0);
        assert_eq!(source.released, 1);
    }

    #[test]
    fn test_timeout_only_bounds_first_frame() {
        let sampler = FrameSampler::with_config(SamplerConfig {
            frame_count: 4,
            timeout_ms: 100,
        });
        let mut source = ScriptedSource::new(4.0);
        source.stall = Duration::from_millis(40);

        let frames = sampler.extract_frames(&mut source).unwrap();
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn test_huge_duration_rejected() {
        let sampler = FrameSampler::new();
        let mut source = ScriptedSource::new(1e300);

        let err = sampler.extract_frames(&mut source).unwrap_err();
        assert!(matches!(err, FrameExtractionError::InvalidDuration(d) if d == 1e300));
        assert_eq!(source.released, 1);
    }

    #[test]
    fn test_zero_frame_count_is_empty() {
        let sampler = FrameSampler::with_config(SamplerConfig {
            frame_count: 0,
            ..Default::default()
        });
        let mut source = ScriptedSource::new(3.0);
        assert!(matches!(
            sampler.extract_frames(&mut source),
            Err(FrameExtractionError::Empty)
        ));
    }
}

use std::time::{Duration, Instant};

use log::{debug, warn};

use super::error::VideoError;
use super::frame::{Frame, RawFrame};

/// Native properties of a decodable video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// A decodable video that supports forward seeking and raster capture.
///
/// A source is owned by a single analysis run. `release` frees decoder
/// resources and must be safe to call more than once.
pub trait VideoSource {
    fn metadata(&mut self) -> Result<VideoMetadata, VideoError>;

    /// Seeks to `position` and captures the frame shown there at native resolution.
    ///
    /// With a `deadline`, an implementation whose seek can stall must give up
    /// once it passes and return `VideoError::DeadlineExceeded`.
    fn seek_and_capture(
        &mut self,
        position: Duration,
        deadline: Option<Instant>,
    ) -> Result<Frame, VideoError>;

    fn release(&mut self);
}

/// 已解码的帧序列（例如原生层解码器交出的 YUV 帧）
///
/// Seeking returns the latest frame whose timestamp is at or before the
/// requested position.
pub struct DecodedVideo {
    frames: Vec<Frame>,
    duration_secs: f64,
    width: u32,
    height: u32,
    released: bool,
}

impl DecodedVideo {
    pub fn new(mut frames: Vec<Frame>, duration_secs: f64) -> Result<Self, VideoError> {
        let (width, height) = match frames.first() {
            Some(first) => (first.width, first.height),
            None => return Err(VideoError::NoVideoStream),
        };

        if let Some(bad) = frames
            .iter()
            .find(|f| f.width != width || f.height != height)
        {
            return Err(VideoError::InvalidFrame(format!(
                "frame {} is {}x{}, stream is {}x{}",
                bad.frame_number, bad.width, bad.height, width, height
            )));
        }

        frames.sort_by_key(|f| f.timestamp);

        Ok(Self {
            frames,
            duration_secs,
            width,
            height,
            released: false,
        })
    }

    pub fn from_raw_frames(raw: Vec<RawFrame>, duration_secs: f64) -> Result<Self, VideoError> {
        let frames = raw
            .iter()
            .map(RawFrame::to_rgba)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(frames, duration_secs)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl VideoSource for DecodedVideo {
    fn metadata(&mut self) -> Result<VideoMetadata, VideoError> {
        if self.released {
            return Err(VideoError::Released);
        }
        Ok(VideoMetadata {
            duration_secs: self.duration_secs,
            width: self.width,
            height: self.height,
        })
    }

    /// Frames are already decoded, so seeking never waits on the deadline.
    fn seek_and_capture(
        &mut self,
        position: Duration,
        _deadline: Option<Instant>,
    ) -> Result<Frame, VideoError> {
        if self.released {
            return Err(VideoError::Released);
        }
        if position.as_secs_f64() > self.duration_secs {
            return Err(VideoError::SeekOutOfRange {
                position,
                duration_secs: self.duration_secs,
            });
        }

        let idx = self
            .frames
            .partition_point(|f| f.timestamp <= position)
            .saturating_sub(1);

        self.frames.get(idx).cloned().ok_or(VideoError::NoVideoStream)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        debug!("DecodedVideo: releasing {} buffered frames", self.frames.len());
        self.frames = Vec::new();
        self.released = true;
    }
}

impl Drop for DecodedVideo {
    fn drop(&mut self) {
        if !self.released {
            warn!("DecodedVideo dropped without release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_at(ms: u64, fill: u8) -> Frame {
        Frame::new(8, 8, vec![fill; 8 * 8 * 4], ms, ms / 100)
    }

    fn ten_second_video() -> DecodedVideo {
        let frames = (0..100).map(|i| frame_at(i * 100, i as u8)).collect();
        DecodedVideo::new(frames, 10.0).unwrap()
    }

    #[test]
    fn test_seek_returns_latest_frame_before_position() {
        let mut video = ten_second_video();

        let frame = video.seek_and_capture(Duration::from_millis(1250), None).unwrap();
        assert_eq!(frame.timestamp_ms(), 1200);

        let frame = video.seek_and_capture(Duration::ZERO, None).unwrap();
        assert_eq!(frame.timestamp_ms(), 0);
        video.release();
    }

    #[test]
    fn test_seek_beyond_duration_fails() {
        let mut video = ten_second_video();
        let err = video.seek_and_capture(Duration::from_secs(11), None).unwrap_err();
        assert!(matches!(err, VideoError::SeekOutOfRange { .. }));
        video.release();
    }

    #[test]
    fn test_release_is_idempotent_and_blocks_access() {
        let mut video = ten_second_video();
        video.release();
        video.release();

        assert!(video.is_released());
        assert!(video.is_empty());
        assert!(matches!(video.metadata(), Err(VideoError::Released)));
    }

    #[test]
    fn test_rejects_empty_and_mixed_resolution() {
        assert!(matches!(
            DecodedVideo::new(vec![], 1.0),
            Err(VideoError::NoVideoStream)
        ));

        let frames = vec![frame_at(0, 0), Frame::new(4, 4, vec![0; 64], 100, 1)];
        assert!(matches!(
            DecodedVideo::new(frames, 1.0),
            Err(VideoError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_from_raw_frames() {
        let raw = (0..3)
            .map(|i| RawFrame {
                width: 4,
                height: 4,
                y_plane: vec![100; 16],
                u_plane: vec![128; 4],
                v_plane: vec![128; 4],
                timestamp_ms: i * 500,
                frame_number: i,
            })
            .collect();

        let mut video = DecodedVideo::from_raw_frames(raw, 1.5).unwrap();
        assert_eq!(video.len(), 3);
        assert_eq!(
            video.metadata().unwrap(),
            VideoMetadata {
                duration_secs: 1.5,
                width: 4,
                height: 4
            }
        );
        video.release();
    }
}

//! FFprobe/FFmpeg CLI backed video source.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Deserialize;

use super::error::VideoError;
use super::frame::Frame;
use super::source::{VideoMetadata, VideoSource};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

pub struct FfmpegVideoSource {
    path: PathBuf,
    ffmpeg_bin: String,
    ffprobe_bin: String,
    metadata: Option<VideoMetadata>,
    released: bool,
}

impl FfmpegVideoSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VideoError::FileNotFound(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            metadata: None,
            released: false,
        })
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg_bin = ffmpeg.into();
        self.ffprobe_bin = ffprobe.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn probe(&self) -> Result<VideoMetadata, VideoError> {
        let mut command = Command::new(&self.ffprobe_bin);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(&self.path);
        let output = run_until(command, None)?;

        if !output.status.success() {
            return Err(VideoError::ProbeFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_probe_output(&output.stdout)
    }
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata, VideoError> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or(VideoError::NoVideoStream)?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(VideoError::ProbeFailed("video stream has no resolution".into())),
    };

    // 容器时长优先，缺失时退回到视频流时长
    let duration_secs = probe
        .format
        .duration
        .as_deref()
        .or(stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoMetadata {
        duration_secs,
        width,
        height,
    })
}

/// Runs the command to completion, killing it once `deadline` passes.
///
/// Both pipes are drained on their own threads so a large raw frame cannot
/// fill the pipe and block the child while we poll it.
fn run_until(mut command: Command, deadline: Option<Instant>) -> Result<Output, VideoError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match deadline {
        None => child.wait()?,
        Some(deadline) => loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Killing {:?}: deadline passed", command.get_program());
                if let Err(e) = child.kill() {
                    warn!("Failed to kill child process: {}", e);
                }
                // reap; the drain threads finish once the pipes close
                let _ = child.wait();
                return Err(VideoError::DeadlineExceeded);
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        },
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buffer) {
            debug!("Pipe read ended early: {}", e);
        }
        buffer
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

impl VideoSource for FfmpegVideoSource {
    fn metadata(&mut self) -> Result<VideoMetadata, VideoError> {
        if self.released {
            return Err(VideoError::Released);
        }
        if let Some(metadata) = self.metadata {
            return Ok(metadata);
        }
        let metadata = self.probe()?;
        info!(
            "Probed {}: {:.2}s {}x{}",
            self.path.display(),
            metadata.duration_secs,
            metadata.width,
            metadata.height
        );
        self.metadata = Some(metadata);
        Ok(metadata)
    }

    fn seek_and_capture(
        &mut self,
        position: Duration,
        deadline: Option<Instant>,
    ) -> Result<Frame, VideoError> {
        let metadata = self.metadata()?;

        let mut command = Command::new(&self.ffmpeg_bin);
        command
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-ss",
                &format!("{:.3}", position.as_secs_f64()),
                "-i",
            ])
            .arg(&self.path)
            .args(["-frames:v", "1", "-pix_fmt", "rgba", "-f", "rawvideo", "-"]);
        let output = run_until(command, deadline)?;

        if !output.status.success() {
            return Err(VideoError::DecodeFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        debug!(
            "Captured {} bytes at {:.3}s from {}",
            output.stdout.len(),
            position.as_secs_f64(),
            self.path.display()
        );
        Frame::from_rgba(metadata.width, metadata.height, output.stdout, position)
    }

    fn release(&mut self) {
        self.metadata = None;
        self.released = true;
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "format": {"duration": "12.480000"},
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1280, "height": 720}
            ]
        }"#;

        let metadata = parse_probe_output(json).unwrap();
        assert_eq!(metadata.width, 1280);
        assert_eq!(metadata.height, 720);
        assert!((metadata.duration_secs - 12.48).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_falls_back_to_stream_duration() {
        let json = br#"{
            "format": {},
            "streams": [{"codec_type": "video", "width": 64, "height": 64, "duration": "3.0"}]
        }"#;
        assert_eq!(parse_probe_output(json).unwrap().duration_secs, 3.0);
    }

    #[test]
    fn test_parse_probe_without_video_stream() {
        let json = br#"{"format": {"duration": "1.0"}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(VideoError::NoVideoStream)
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let result = FfmpegVideoSource::open("/definitely/not/here.mp4");
        assert!(matches!(result, Err(VideoError::FileNotFound(_))));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_ffmpeg_is_killed_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let ffmpeg = write_script(dir.path(), "ffmpeg", "exec sleep 30");

        let mut source = FfmpegVideoSource::open(&video)
            .unwrap()
            .with_binaries(ffmpeg.to_string_lossy(), "unused-ffprobe");
        source.metadata = Some(VideoMetadata {
            duration_secs: 10.0,
            width: 2,
            height: 2,
        });

        let started = Instant::now();
        let result =
            source.seek_and_capture(Duration::ZERO, Some(started + Duration::from_millis(100)));

        assert!(matches!(result, Err(VideoError::DeadlineExceeded)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_reads_raw_frame_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        // 2x2 RGBA = 16 bytes
        let ffmpeg = write_script(dir.path(), "ffmpeg", "printf 'AAAABBBBCCCCDDDD'");

        let mut source = FfmpegVideoSource::open(&video)
            .unwrap()
            .with_binaries(ffmpeg.to_string_lossy(), "unused-ffprobe");
        source.metadata = Some(VideoMetadata {
            duration_secs: 10.0,
            width: 2,
            height: 2,
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        let frame = source
            .seek_and_capture(Duration::from_secs(1), Some(deadline))
            .unwrap();
        assert_eq!(frame.data.len(), 16);
        assert_eq!(frame.timestamp_ms(), 1000);
    }

    #[test]
    fn test_missing_probe_binary_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = FfmpegVideoSource::open(file.path())
            .unwrap()
            .with_binaries("no-such-ffmpeg-bin", "no-such-ffprobe-bin");

        assert!(matches!(source.metadata(), Err(VideoError::Io(_))));
        source.release();
        assert!(matches!(source.metadata(), Err(VideoError::Released)));
    }
}

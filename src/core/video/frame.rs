use std::io::Cursor;
use std::time::Duration;

use image::{ImageOutputFormat, RgbaImage};

use super::error::VideoError;

/// 单帧栅格图像（RGBA），分辨率与源视频一致
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    /// Builds a frame from an RGBA buffer, rejecting buffers whose length does
    /// not match the declared resolution.
    pub fn from_rgba(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp: Duration,
    ) -> Result<Self, VideoError> {
        let frame = Self {
            width,
            height,
            data,
            timestamp,
            frame_number: 0,
        };
        frame.check_buffer()?;
        Ok(frame)
    }

    /// Fails when the buffer is not exactly `width * height` RGBA pixels.
    pub fn check_buffer(&self) -> Result<(), VideoError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(VideoError::InvalidFrame(format!(
                "{}x{} RGBA frame needs {} bytes, got {}",
                self.width,
                self.height,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis() as u64
    }

    /// BT.601 luma plane
    pub fn luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .map(|rgba| {
                let r = rgba[0] as u32;
                let g = rgba[1] as u32;
                let b = rgba[2] as u32;
                ((r * 299 + g * 587 + b * 114) / 1000) as u8
            })
            .collect()
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Result<Frame, VideoError> {
        let img = self.to_image()?;
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Ok(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        })
    }

    /// Encodes the frame as JPEG, the format inference endpoints accept.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, VideoError> {
        let rgb = image::DynamicImage::ImageRgba8(self.to_image()?).to_rgb8();
        let mut buffer = Cursor::new(Vec::new());
        rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
        Ok(buffer.into_inner())
    }

    fn to_image(&self) -> Result<RgbaImage, VideoError> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            VideoError::InvalidFrame(format!(
                "buffer of {} bytes does not fit {}x{}",
                self.data.len(),
                self.width,
                self.height
            ))
        })
    }
}

/// 原生解码器交出的 YUV 4:2:0 帧
#[derive(Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub u_plane: Vec<u8>,
    pub v_plane: Vec<u8>,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl RawFrame {
    pub fn to_rgba(&self) -> Result<Frame, VideoError> {
        let luma_len = (self.width * self.height) as usize;
        let chroma_len = ((self.width / 2) * (self.height / 2)) as usize;
        if self.y_plane.len() < luma_len
            || self.u_plane.len() < chroma_len
            || self.v_plane.len() < chroma_len
        {
            return Err(VideoError::InvalidFrame(format!(
                "YUV planes too small for {}x{}",
                self.width, self.height
            )));
        }

        let mut rgba_data = vec![0u8; luma_len * 4];
        let chroma_width = (self.width / 2).max(1);
        let max_uv = chroma_len.saturating_sub(1);

        for y in 0..self.height {
            for x in 0..self.width {
                let y_idx = (y * self.width + x) as usize;
                let uv_idx = (((y / 2) * chroma_width + x / 2) as usize).min(max_uv);

                let y_val = self.y_plane[y_idx] as f32;
                let u_val = self.u_plane[uv_idx] as f32 - 128.0;
                let v_val = self.v_plane[uv_idx] as f32 - 128.0;

                let rgba_idx = y_idx * 4;
                rgba_data[rgba_idx] = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
                rgba_data[rgba_idx + 1] =
                    (y_val - 0.344136 * u_val - 0.714136 * v_val).clamp(0.0, 255.0) as u8;
                rgba_data[rgba_idx + 2] = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
                rgba_data[rgba_idx + 3] = 255;
            }
        }

        Ok(Frame::new(
            self.width,
            self.height,
            rgba_data,
            self.timestamp_ms,
            self.frame_number,
        ))
    }
}

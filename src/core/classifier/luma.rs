use log::debug;

use super::{ClassifierError, FrameClassifier, LabelScore, LoadedClassifier};
use crate::core::video::Frame;

const ANALYSIS_SIZE: u32 = 256;

/// 基于亮度纹理与边缘统计的本地分类器（无需模型文件）
///
/// Over-smoothed frames with few edges lean toward `fake`; frames with
/// natural sensor texture lean toward `real`.
pub struct LumaStatsClassifier {
    edge_threshold: i32,
    edge_reference: f32,
    texture_reference: f32,
}

impl LumaStatsClassifier {
    pub fn new() -> Self {
        Self {
            edge_threshold: 20,
            edge_reference: 0.12,
            texture_reference: 0.18,
        }
    }
}

impl Default for LumaStatsClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClassifier for LumaStatsClassifier {
    fn name(&self) -> &str {
        "luma-stats"
    }

    fn load(&self) -> Result<Box<dyn LoadedClassifier>, ClassifierError> {
        Ok(Box::new(LumaStatsHandle {
            edge_threshold: self.edge_threshold,
            edge_reference: self.edge_reference,
            texture_reference: self.texture_reference,
        }))
    }
}

struct LumaStatsHandle {
    edge_threshold: i32,
    edge_reference: f32,
    texture_reference: f32,
}

impl LumaStatsHandle {
    /// Integer gradient check, squared to avoid sqrt.
    fn edge_density(&self, gray: &[u8], width: u32, height: u32) -> f32 {
        let w = width as usize;
        let h = height as usize;
        let threshold_squared = self.edge_threshold * self.edge_threshold;
        let mut edge_count = 0usize;
        let mut total = 0usize;

        for y in 1..(h - 1) {
            for x in 1..(w - 1) {
                let idx = y * w + x;
                let gx = gray[idx + 1] as i32 - gray[idx - 1] as i32;
                let gy = gray[idx + w] as i32 - gray[idx - w] as i32;
                if gx * gx + gy * gy > threshold_squared {
                    edge_count += 1;
                }
                total += 1;
            }
        }

        if total == 0 {
            0.0
        } else {
            edge_count as f32 / total as f32
        }
    }

    fn texture(&self, gray: &[u8]) -> f32 {
        if gray.is_empty() {
            return 0.0;
        }
        let n = gray.len() as f32;
        let mean = gray.iter().map(|&v| v as f32 / 255.0).sum::<f32>() / n;
        let variance = gray
            .iter()
            .map(|&v| (v as f32 / 255.0 - mean).powi(2))
            .sum::<f32>()
            / n;
        variance.sqrt()
    }
}

impl LoadedClassifier for LumaStatsHandle {
    fn classify(&self, frame: &Frame) -> Result<Vec<LabelScore>, ClassifierError> {
        if frame.width < 3 || frame.height < 3 {
            return Err(ClassifierError::ClassificationFailed(format!(
                "frame {}x{} too small",
                frame.width, frame.height
            )));
        }
        frame
            .check_buffer()
            .map_err(|e| ClassifierError::ClassificationFailed(e.to_string()))?;

        let scaled;
        let frame = if frame.width > ANALYSIS_SIZE || frame.height > ANALYSIS_SIZE {
            scaled = frame.resize_to(ANALYSIS_SIZE, ANALYSIS_SIZE)?;
            &scaled
        } else {
            frame
        };

        let gray = frame.luma();
        let edges = self.edge_density(&gray, frame.width, frame.height);
        let texture = self.texture(&gray);

        let naturalness = 0.5 * (edges / self.edge_reference).min(1.0)
            + 0.5 * (texture / self.texture_reference).min(1.0);
        debug!(
            "luma stats frame {}: edges {:.3}, texture {:.3}",
            frame.frame_number, edges, texture
        );

        Ok(vec![
            LabelScore::new("real", naturalness),
            LabelScore::new("fake", 1.0 - naturalness),
        ])
    }
}

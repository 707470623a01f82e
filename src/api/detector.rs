//! 深度伪造检测器

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::error::DetectApiError;
use crate::core::classifier::FrameClassifier;
use crate::core::detection::{DetectionPipeline, DetectionResult, DetectorConfig};
use crate::core::video::{FfmpegVideoSource, VideoSource};

/// 深度伪造检测器 - 抽帧 + 分类 + 评分，失败时自动降级
///
/// ```ignore
/// let detector = DeepfakeDetector::create(DetectorConfig::default(), Arc::new(LumaStatsClassifier::new()))?;
/// let result = detector.analyze_file("clip.mp4", None)?;
/// println!("{} ({:.1}%)", result.verdict, result.confidence);
/// ```
pub struct DeepfakeDetector {
    pipeline: DetectionPipeline,
    rng: Mutex<StdRng>,
}

impl DeepfakeDetector {
    /// 创建检测器，随机源取自操作系统
    pub fn create(
        config: DetectorConfig,
        classifier: Arc<dyn FrameClassifier>,
    ) -> Result<Self, DetectApiError> {
        config.validate()?;
        let rng = StdRng::try_from_os_rng()
            .map_err(|e| DetectApiError::entropy_unavailable(e.to_string()))?;
        Ok(Self::build(config, classifier, rng))
    }

    /// 固定种子，降级路径的评分可复现
    pub fn with_seed(
        config: DetectorConfig,
        classifier: Arc<dyn FrameClassifier>,
        seed: u64,
    ) -> Result<Self, DetectApiError> {
        config.validate()?;
        Ok(Self::build(config, classifier, StdRng::seed_from_u64(seed)))
    }

    /// 从 JSON 配置文件创建
    pub fn from_config_file(
        path: impl AsRef<Path>,
        classifier: Arc<dyn FrameClassifier>,
    ) -> Result<Self, DetectApiError> {
        let config = DetectorConfig::from_json_file(path)?;
        Self::create(config, classifier)
    }

    fn build(config: DetectorConfig, classifier: Arc<dyn FrameClassifier>, rng: StdRng) -> Self {
        info!(
            "🎬 DeepfakeDetector: created ({}, {} frames)",
            classifier.name(),
            config.sampler.frame_count
        );
        Self {
            pipeline: DetectionPipeline::new(config, classifier),
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        self.pipeline.config()
    }

    /// 分析一个已打开的视频源；返回前视频源已释放
    pub fn analyze(
        &self,
        filename: &str,
        source: &mut dyn VideoSource,
        on_progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<DetectionResult, DetectApiError> {
        let mut run_rng = self.fork_rng();
        Ok(self.pipeline.run(filename, source, &mut run_rng, on_progress)?)
    }

    /// 分析本地视频文件（ffprobe/ffmpeg 解码）
    pub fn analyze_file(
        &self,
        path: impl AsRef<Path>,
        on_progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<DetectionResult, DetectApiError> {
        let path = path.as_ref();
        let mut source =
            FfmpegVideoSource::open(path).map_err(|e| DetectApiError::video_unavailable(&e))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.analyze(&filename, &mut source, on_progress)
    }

    /// Each run gets its own generator so concurrent runs do not contend.
    fn fork_rng(&self) -> StdRng {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        StdRng::from_rng(&mut *rng)
    }
}

impl Drop for DeepfakeDetector {
    fn drop(&mut self) {
        info!("🗑️ DeepfakeDetector: released");
    }
}

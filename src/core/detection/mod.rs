//! 检测流程：抽帧 → 分类 → 聚合，任何阶段失败都降级到合成评分

pub mod config;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod progress;
pub mod result;
pub mod scoring;
pub mod state_machine;

pub use config::DetectorConfig;
pub use error::{ConfigError, DetectionError};
pub use fallback::{FailedStage, FallbackConfig, FallbackReason, FallbackSynthesizer};
pub use pipeline::DetectionPipeline;
pub use progress::ProgressTracker;
pub use result::{DetectionResult, Feature, FeatureScores, Metadata, Verdict};
pub use scoring::{AggregatorConfig, ScoreAggregator, ScoreSummary, ScoringMode};
pub use state_machine::{PipelineState, PipelineStateMachine, StageEvent};

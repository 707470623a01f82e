use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use rand::Rng;
use rayon::prelude::*;
use serde_json::json;

use super::config::DetectorConfig;
use super::error::DetectionError;
use super::fallback::{FallbackReason, FallbackSynthesizer};
use super::progress::{
    classification_progress, ProgressTracker, PROGRESS_CLASSIFIED, PROGRESS_CLASSIFIER_READY,
    PROGRESS_DONE, PROGRESS_FRAMES_EXTRACTED, PROGRESS_STARTED,
};
use super::result::{
    DetectionResult, Metadata, META_CLASSIFICATION, META_FAILED_FRAMES, META_FALLBACK_MODE,
    META_FRAMES_EXTRACTED, META_MODEL_USED, META_PREDICTIONS_COUNT, META_SCORING_MODE,
};
use super::scoring::ScoreAggregator;
use super::state_machine::PipelineStateMachine;
use crate::core::classifier::{ClassifierError, FrameClassifier, LabelScore, LoadedClassifier, Prediction};
use crate::core::video::{Frame, FrameSampler, VideoSource};

/// Sequences classifier load, frame sampling, per-frame classification and
/// aggregation. Every failure degrades to the fallback synthesizer.
pub struct DetectionPipeline {
    config: DetectorConfig,
    classifier: Arc<dyn FrameClassifier>,
    sampler: FrameSampler,
    aggregator: ScoreAggregator,
    fallback: FallbackSynthesizer,
}

struct Classified {
    predictions: Vec<Prediction>,
    failed_frames: Vec<usize>,
}

impl DetectionPipeline {
    pub fn new(config: DetectorConfig, classifier: Arc<dyn FrameClassifier>) -> Self {
        Self {
            sampler: FrameSampler::with_config(config.sampler.clone()),
            aggregator: ScoreAggregator::with_config(config.aggregator.clone()),
            fallback: FallbackSynthesizer::with_config(config.fallback.clone()),
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Analyzes one video. Only `DetectionError::FallbackExhausted` is ever
    /// returned; every other failure yields a result with `fallbackMode` set.
    /// The source is released before this returns.
    pub fn run<R: Rng + ?Sized>(
        &self,
        filename: &str,
        source: &mut dyn VideoSource,
        rng: &mut R,
        on_progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<DetectionResult, DetectionError> {
        let started = Instant::now();
        let mut progress = ProgressTracker::new(on_progress);
        let mut machine = PipelineStateMachine::new();
        let mut source = scopeguard::guard(source, |source| source.release());

        info!("🔍 Starting analysis of {}", filename);

        // 观察者回调也可能 panic，第一次上报同样走降级路径
        let model_outcome = catch_unwind(AssertUnwindSafe(|| {
            progress.report(PROGRESS_STARTED);
            self.run_model_path(filename, &mut **source, &mut *rng, &mut progress, &mut machine, started)
        }));

        let reason = match model_outcome {
            Ok(Ok(result)) => {
                info!(
                    "✅ {}: {} ({:.1}% confidence) in {:.2}s",
                    filename, result.verdict, result.confidence, result.detection_time
                );
                return Ok(result);
            }
            Ok(Err(err)) => {
                warn!("Model path failed at {:?}: {}", machine.current_state(), err);
                FallbackReason::from(&err)
            }
            Err(panic) => {
                let err = DetectionError::Unexpected(panic_message(panic.as_ref()));
                error!("Model path crashed at {:?}: {}", machine.current_state(), err);
                FallbackReason::from(&err)
            }
        };

        machine.fail();
        source.release();

        let fallback_outcome = catch_unwind(AssertUnwindSafe(|| {
            self.fallback
                .synthesize(filename, &reason, &mut *rng, &mut progress, started)
        }));

        match fallback_outcome {
            Ok(result) => {
                machine.advance();
                Ok(result)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Fallback analysis crashed for {}: {}", filename, message);
                Err(DetectionError::FallbackExhausted(message))
            }
        }
    }

    fn run_model_path<R: Rng + ?Sized>(
        &self,
        filename: &str,
        source: &mut dyn VideoSource,
        rng: &mut R,
        progress: &mut ProgressTracker<'_>,
        machine: &mut PipelineStateMachine,
        started: Instant,
    ) -> Result<DetectionResult, DetectionError> {
        machine.advance();
        info!("Loading classifier '{}'", self.classifier.name());
        let handle = match self.classifier.load() {
            Ok(handle) => handle,
            Err(err) => {
                progress.report(PROGRESS_CLASSIFIER_READY);
                return Err(DetectionError::ClassifierLoad(err));
            }
        };
        progress.report(PROGRESS_CLASSIFIER_READY);

        machine.advance();
        let frames = self.sampler.extract_frames(source)?;
        let frame_count = frames.len();
        progress.report(PROGRESS_FRAMES_EXTRACTED);

        machine.advance();
        let classified = if self.config.parallel_classification {
            self.classify_parallel(handle.as_ref(), &frames)
        } else {
            self.classify_sequential(handle.as_ref(), &frames, progress)
        };
        drop(frames);

        if classified.predictions.is_empty() {
            return Err(DetectionError::NoPredictions {
                frames: frame_count,
                failed: classified.failed_frames.len(),
            });
        }
        progress.report(PROGRESS_CLASSIFIED);

        machine.advance();
        let aggregation = self.aggregator.aggregate(&classified.predictions, rng)?;

        let mut metadata = Metadata::new();
        metadata.insert(META_FALLBACK_MODE.into(), json!(false));
        metadata.insert(META_MODEL_USED.into(), json!(self.classifier.name()));
        metadata.insert(
            META_PREDICTIONS_COUNT.into(),
            json!(classified.predictions.len()),
        );
        metadata.insert(META_FRAMES_EXTRACTED.into(), json!(frame_count));
        metadata.insert(META_FAILED_FRAMES.into(), json!(classified.failed_frames));
        metadata.insert(META_SCORING_MODE.into(), json!(aggregation.mode.as_str()));
        metadata.insert(
            META_CLASSIFICATION.into(),
            json!(if self.config.parallel_classification {
                "parallel"
            } else {
                "sequential"
            }),
        );

        machine.advance();
        progress.report(PROGRESS_DONE);

        Ok(DetectionResult::assemble(
            filename,
            aggregation.summary,
            started.elapsed().as_secs_f64(),
            metadata,
        ))
    }

    fn classify_sequential(
        &self,
        handle: &dyn LoadedClassifier,
        frames: &[Frame],
        progress: &mut ProgressTracker<'_>,
    ) -> Classified {
        let mut classified = Classified {
            predictions: Vec::with_capacity(frames.len()),
            failed_frames: Vec::new(),
        };

        for (index, frame) in frames.iter().enumerate() {
            record_outcome(&mut classified, index, handle.classify(frame));
            progress.report(classification_progress(index + 1, frames.len()));
        }

        classified
    }

    fn classify_parallel(&self, handle: &dyn LoadedClassifier, frames: &[Frame]) -> Classified {
        let classify_all = || -> Vec<Result<Vec<LabelScore>, ClassifierError>> {
            frames.par_iter().map(|frame| handle.classify(frame)).collect()
        };

        let outcomes = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.thread_count())
            .build()
        {
            Ok(pool) => pool.install(classify_all),
            Err(err) => {
                warn!("Falling back to the global rayon pool: {}", err);
                classify_all()
            }
        };

        let mut classified = Classified {
            predictions: Vec::with_capacity(frames.len()),
            failed_frames: Vec::new(),
        };
        for (index, outcome) in outcomes.into_iter().enumerate() {
            record_outcome(&mut classified, index, outcome);
        }
        classified
    }
}

fn record_outcome(
    classified: &mut Classified,
    index: usize,
    outcome: Result<Vec<LabelScore>, ClassifierError>,
) {
    match outcome {
        Ok(labels) if !labels.is_empty() => {
            debug!("frame {}: {} labels", index, labels.len());
            classified.predictions.push(Prediction {
                frame_index: index,
                labels,
            });
        }
        Ok(_) => {
            debug!("frame {}: classifier returned nothing", index);
            classified.failed_frames.push(index);
        }
        Err(err) => {
            warn!("frame {}: {}", index, err);
            classified.failed_frames.push(index);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

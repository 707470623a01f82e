use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::DetectionError;
use super::result::{Feature, FeatureScores, Verdict};
use crate::core::classifier::Prediction;

/// `min(100, |real - fake| * 200)`
pub fn confidence_for(real_score: f64, fake_score: f64) -> f64 {
    ((real_score - fake_score).abs() * 200.0).min(100.0)
}

/// Complementary scores with their derived confidence, verdict and features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub real_score: f64,
    pub fake_score: f64,
    pub confidence: f64,
    pub verdict: Verdict,
    pub features: FeatureScores,
}

impl ScoreSummary {
    pub fn from_scores(real_score: f64, features: FeatureScores) -> Self {
        let real_score = real_score.clamp(0.0, 1.0);
        let fake_score = 1.0 - real_score;
        let confidence = confidence_for(real_score, fake_score);
        Self {
            real_score,
            fake_score,
            confidence,
            verdict: Verdict::classify(real_score, fake_score, confidence),
            features,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Scores come from fake/real labels found in the predictions.
    Labels,
    /// No prediction carried a recognised label; scores drawn from the real-leaning prior.
    Prior,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::Labels => "labels",
            ScoringMode::Prior => "prior",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureWeights {
    pub face_inconsistencies: f64,
    pub audio_visual_sync: f64,
    pub texture_anomalies: f64,
    pub unnatural_eye_blinking: f64,
    pub unnatural_movements: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            face_inconsistencies: 120.0,
            audio_visual_sync: 110.0,
            texture_anomalies: 130.0,
            unnatural_eye_blinking: 100.0,
            unnatural_movements: 120.0,
        }
    }
}

impl FeatureWeights {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::FaceInconsistencies => self.face_inconsistencies,
            Feature::AudioVisualSync => self.audio_visual_sync,
            Feature::TextureAnomalies => self.texture_anomalies,
            Feature::UnnaturalEyeBlinking => self.unnatural_eye_blinking,
            Feature::UnnaturalMovements => self.unnatural_movements,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub feature_weights: FeatureWeights,
    /// Lowercase labels counted as evidence of manipulation.
    pub fake_labels: Vec<String>,
    /// Lowercase labels counted as evidence of authenticity.
    pub real_labels: Vec<String>,
    pub prior_real_min: f64,
    pub prior_real_max: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            feature_weights: FeatureWeights::default(),
            fake_labels: ["fake", "deepfake", "manipulated", "synthetic", "artificial"]
                .map(String::from)
                .to_vec(),
            real_labels: ["real", "authentic", "realism", "genuine"]
                .map(String::from)
                .to_vec(),
            prior_real_min: 0.6,
            prior_real_max: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub summary: ScoreSummary,
    pub mode: ScoringMode,
    pub informative_frames: usize,
}

/// 将逐帧预测聚合为真/假概率、置信度和特征分
pub struct ScoreAggregator {
    config: AggregatorConfig,
}

impl ScoreAggregator {
    pub fn new() -> Self {
        Self::with_config(AggregatorConfig::default())
    }

    pub fn with_config(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn aggregate<R: Rng + ?Sized>(
        &self,
        predictions: &[Prediction],
        rng: &mut R,
    ) -> Result<Aggregation, DetectionError> {
        if predictions.is_empty() {
            return Err(DetectionError::NoPredictions {
                frames: 0,
                failed: 0,
            });
        }

        let frame_scores: Vec<f64> = predictions
            .iter()
            .filter_map(|p| self.frame_fake_probability(p))
            .collect();

        let (real_score, mode) = if frame_scores.is_empty() {
            let (lo, hi) = self.prior_range();
            let real = if hi > lo { rng.random_range(lo..hi) } else { lo };
            (real, ScoringMode::Prior)
        } else {
            let fake = frame_scores.iter().sum::<f64>() / frame_scores.len() as f64;
            (1.0 - fake, ScoringMode::Labels)
        };

        let fake_score = 1.0 - real_score.clamp(0.0, 1.0);
        let summary = ScoreSummary::from_scores(real_score, self.features_for(fake_score));

        debug!(
            "Aggregated {} predictions ({} informative, {} mode): real {:.3}, fake {:.3}, confidence {:.1}",
            predictions.len(),
            frame_scores.len(),
            mode.as_str(),
            summary.real_score,
            summary.fake_score,
            summary.confidence
        );

        Ok(Aggregation {
            summary,
            mode,
            informative_frames: frame_scores.len(),
        })
    }

    /// Fake probability of one frame, or `None` when no label is recognised.
    pub fn frame_fake_probability(&self, prediction: &Prediction) -> Option<f64> {
        let mut fake_mass = 0.0f64;
        let mut real_mass = 0.0f64;

        for label in &prediction.labels {
            let name = label.label.trim().to_lowercase();
            let score = (label.score as f64).max(0.0);
            if self.config.fake_labels.iter().any(|l| *l == name) {
                fake_mass += score;
            } else if self.config.real_labels.iter().any(|l| *l == name) {
                real_mass += score;
            }
        }

        let total = fake_mass + real_mass;
        if total > 0.0 && total.is_finite() {
            Some(fake_mass / total)
        } else {
            None
        }
    }

    /// Each feature is `min(100, fake_score * weight)`.
    pub fn features_for(&self, fake_score: f64) -> FeatureScores {
        let fake_score = fake_score.clamp(0.0, 1.0);
        let weights = &self.config.feature_weights;
        FeatureScores::from_fn(|feature| (fake_score * weights.get(feature)).clamp(0.0, 100.0))
    }

    fn prior_range(&self) -> (f64, f64) {
        let lo = self.config.prior_real_min.clamp(0.0, 1.0);
        let hi = self.config.prior_real_max.clamp(0.0, 1.0);
        (lo.min(hi), hi.max(lo))
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::LabelScore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn prediction(frame_index: usize, labels: &[(&str, f32)]) -> Prediction {
        Prediction {
            frame_index,
            labels: labels
                .iter()
                .map(|(label, score)| LabelScore::new(*label, *score))
                .collect(),
        }
    }

    fn assert_contract(summary: &ScoreSummary) {
        assert!((summary.real_score + summary.fake_score - 1.0).abs() < 1e-9);
        let expected = ((summary.real_score - summary.fake_score).abs() * 200.0).min(100.0);
        assert!((summary.confidence - expected).abs() < 1e-9);
        assert_eq!(
            summary.verdict,
            Verdict::classify(summary.real_score, summary.fake_score, summary.confidence)
        );
        for (_, value) in summary.features.iter() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_empty_predictions_rejected() {
        let aggregator = ScoreAggregator::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            aggregator.aggregate(&[], &mut rng),
            Err(DetectionError::NoPredictions { .. })
        ));
    }

    #[test]
    fn test_label_mode_averages_frames() {
        let aggregator = ScoreAggregator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let predictions = vec![
            prediction(0, &[("Fake", 0.9), ("Real", 0.1)]),
            prediction(1, &[("deepfake", 0.7), ("realism", 0.3)]),
            prediction(2, &[("tabby cat", 0.99)]),
        ];

        let aggregation = aggregator.aggregate(&predictions, &mut rng).unwrap();

        assert_eq!(aggregation.mode, ScoringMode::Labels);
        assert_eq!(aggregation.informative_frames, 2);
        assert!((aggregation.summary.fake_score - 0.8).abs() < 1e-6);
        assert_eq!(aggregation.summary.verdict, Verdict::Fake);
        assert_contract(&aggregation.summary);
    }

    #[test]
    fn test_prior_mode_leans_real() {
        let aggregator = ScoreAggregator::new();
        let predictions = vec![prediction(0, &[("tabby cat", 0.6), ("tiger", 0.4)])];

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let aggregation = aggregator.aggregate(&predictions, &mut rng).unwrap();
            assert_eq!(aggregation.mode, ScoringMode::Prior);
            assert!((0.6..0.9).contains(&aggregation.summary.real_score));
            assert_contract(&aggregation.summary);
        }
    }

    #[test]
    fn test_close_scores_are_uncertain() {
        let aggregator = ScoreAggregator::new();
        let mut rng = StdRng::seed_from_u64(3);
        let predictions = vec![prediction(0, &[("fake", 0.45), ("real", 0.55)])];

        let aggregation = aggregator.aggregate(&predictions, &mut rng).unwrap();
        assert!(aggregation.summary.confidence < 50.0);
        assert_eq!(aggregation.summary.verdict, Verdict::Uncertain);
    }

    #[test]
    fn test_features_bounded_and_monotonic() {
        let aggregator = ScoreAggregator::new();
        let mut previous = aggregator.features_for(0.0);
        assert_eq!(previous, FeatureScores::default());

        for step in 1..=100 {
            let fake = step as f64 / 100.0;
            let features = aggregator.features_for(fake);
            for feature in Feature::ALL {
                let value = features.get(feature);
                assert!((0.0..=100.0).contains(&value));
                assert!(value >= previous.get(feature));
            }
            previous = features;
        }

        let saturated = aggregator.features_for(1.0);
        assert_eq!(saturated.texture_anomalies, 100.0);
        assert_eq!(saturated.unnatural_eye_blinking, 100.0);
    }

    #[test]
    fn test_contract_holds_across_label_mixes() {
        let aggregator = ScoreAggregator::new();
        let mut rng = StdRng::seed_from_u64(11);

        for i in 0..=20 {
            let fake = i as f32 / 20.0;
            let predictions = vec![prediction(0, &[("fake", fake), ("real", 1.0 - fake)])];
            let aggregation = aggregator.aggregate(&predictions, &mut rng).unwrap();
            assert_contract(&aggregation.summary);
        }
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::scoring::ScoreSummary;

/// Free-form diagnostics recording which path produced a result.
pub type Metadata = BTreeMap<String, serde_json::Value>;

pub const META_FALLBACK_MODE: &str = "fallbackMode";
pub const META_REASON: &str = "reason";
pub const META_STAGE: &str = "stage";
pub const META_MODEL_USED: &str = "modelUsed";
pub const META_PREDICTIONS_COUNT: &str = "predictionsCount";
pub const META_FRAMES_EXTRACTED: &str = "framesExtracted";
pub const META_FAILED_FRAMES: &str = "failedFrames";
pub const META_SCORING_MODE: &str = "scoringMode";
pub const META_CLASSIFICATION: &str = "classification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Real,
    Fake,
    Uncertain,
}

impl Verdict {
    /// `uncertain` below 50 confidence, otherwise the larger score wins.
    pub fn classify(real_score: f64, fake_score: f64, confidence: f64) -> Self {
        if confidence < 50.0 {
            Verdict::Uncertain
        } else if real_score > fake_score {
            Verdict::Real
        } else {
            Verdict::Fake
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Real => "real",
            Verdict::Fake => "fake",
            Verdict::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real" => Ok(Verdict::Real),
            "fake" => Ok(Verdict::Fake),
            "uncertain" => Ok(Verdict::Uncertain),
            other => Err(format!("unknown verdict: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    FaceInconsistencies,
    AudioVisualSync,
    TextureAnomalies,
    UnnaturalEyeBlinking,
    UnnaturalMovements,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::FaceInconsistencies,
        Feature::AudioVisualSync,
        Feature::TextureAnomalies,
        Feature::UnnaturalEyeBlinking,
        Feature::UnnaturalMovements,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Feature::FaceInconsistencies => "faceInconsistencies",
            Feature::AudioVisualSync => "audioVisualSync",
            Feature::TextureAnomalies => "textureAnomalies",
            Feature::UnnaturalEyeBlinking => "unnaturalEyeBlinking",
            Feature::UnnaturalMovements => "unnaturalMovements",
        }
    }
}

/// 五项异常指标，取值 [0, 100]，越高越可疑
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureScores {
    pub face_inconsistencies: f64,
    pub audio_visual_sync: f64,
    pub texture_anomalies: f64,
    pub unnatural_eye_blinking: f64,
    pub unnatural_movements: f64,
}

impl FeatureScores {
    pub fn from_fn(mut score: impl FnMut(Feature) -> f64) -> Self {
        Self {
            face_inconsistencies: score(Feature::FaceInconsistencies),
            audio_visual_sync: score(Feature::AudioVisualSync),
            texture_anomalies: score(Feature::TextureAnomalies),
            unnatural_eye_blinking: score(Feature::UnnaturalEyeBlinking),
            unnatural_movements: score(Feature::UnnaturalMovements),
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::FaceInconsistencies => self.face_inconsistencies,
            Feature::AudioVisualSync => self.audio_visual_sync,
            Feature::TextureAnomalies => self.texture_anomalies,
            Feature::UnnaturalEyeBlinking => self.unnatural_eye_blinking,
            Feature::UnnaturalMovements => self.unnatural_movements,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

/// Outcome of one analysis run. Produced once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub id: String,
    pub filename: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub real_score: f64,
    pub fake_score: f64,
    pub confidence: f64,
    pub verdict: Verdict,
    pub features: FeatureScores,
    /// Seconds
    pub detection_time: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DetectionResult {
    pub(crate) fn assemble(
        filename: &str,
        summary: ScoreSummary,
        detection_time: f64,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            filename: filename.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            real_score: summary.real_score,
            fake_score: summary.fake_score,
            confidence: summary.confidence,
            verdict: summary.verdict,
            features: summary.features,
            detection_time,
            metadata,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.metadata
            .get(META_FALLBACK_MODE)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        if !self.is_fallback() {
            return None;
        }
        self.metadata.get(META_REASON).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> DetectionResult {
        let mut metadata = Metadata::new();
        metadata.insert(META_FALLBACK_MODE.into(), json!(true));
        metadata.insert(META_REASON.into(), json!("model offline"));
        DetectionResult::assemble(
            "clip.mp4",
            ScoreSummary::from_scores(0.8, FeatureScores::default()),
            1.25,
            metadata,
        )
    }

    #[test]
    fn test_verdict_rule() {
        assert_eq!(Verdict::classify(0.9, 0.1, 80.0), Verdict::Real);
        assert_eq!(Verdict::classify(0.1, 0.9, 80.0), Verdict::Fake);
        assert_eq!(Verdict::classify(0.55, 0.45, 20.0), Verdict::Uncertain);
        assert_eq!(Verdict::classify(0.5, 0.5, 50.0), Verdict::Fake);
    }

    #[test]
    fn test_verdict_round_trips_through_str() {
        for verdict in [Verdict::Real, Verdict::Fake, Verdict::Uncertain] {
            assert_eq!(verdict.as_str().parse::<Verdict>().unwrap(), verdict);
        }
        assert!("maybe".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_serialized_shape_uses_camel_case_keys() {
        let value = serde_json::to_value(sample_result()).unwrap();

        for key in [
            "id",
            "filename",
            "timestamp",
            "realScore",
            "fakeScore",
            "confidence",
            "verdict",
            "features",
            "detectionTime",
            "metadata",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["verdict"], json!("real"));
        for feature in Feature::ALL {
            assert!(value["features"].get(feature.key()).is_some());
        }
    }

    #[test]
    fn test_fallback_accessors() {
        let result = sample_result();
        assert!(result.is_fallback());
        assert_eq!(result.fallback_reason(), Some("model offline"));
        assert_eq!(result.id.len(), 32);
        assert!(result.timestamp > 0);
    }
}

use serde::{Deserialize, Serialize};

use crate::core::detection::{ConfigError, DetectionError};
use crate::core::store::StoreError;
use crate::core::video::VideoError;

/// 面向前端的错误：类型标识 + 可读信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectApiError {
    pub error_type: String,
    pub message: String,
}

impl DetectApiError {
    pub(crate) fn video_unavailable(e: &VideoError) -> Self {
        Self {
            error_type: "VideoUnavailable".to_string(),
            message: format!("No usable video: {}", e),
        }
    }

    pub(crate) fn entropy_unavailable(e: String) -> Self {
        Self {
            error_type: "EntropyUnavailable".to_string(),
            message: format!("Could not seed the random generator: {}", e),
        }
    }
}

impl From<DetectionError> for DetectApiError {
    fn from(e: DetectionError) -> Self {
        match e {
            DetectionError::FallbackExhausted(reason) => Self {
                error_type: "AnalysisFailed".to_string(),
                message: format!(
                    "Analysis failed, please retry with a different video ({})",
                    reason
                ),
            },
            other => Self {
                error_type: "DetectionError".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for DetectApiError {
    fn from(e: ConfigError) -> Self {
        Self {
            error_type: "InvalidConfig".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for DetectApiError {
    fn from(e: StoreError) -> Self {
        let error_type = match &e {
            StoreError::NotFound(_) => "NotFound",
            _ => "StoreError",
        };
        Self {
            error_type: error_type.to_string(),
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for DetectApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for DetectApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_exhausted_asks_for_retry() {
        let err = DetectApiError::from(DetectionError::FallbackExhausted("boom".into()));
        assert_eq!(err.error_type, "AnalysisFailed");
        assert!(err.message.contains("retry"));
        assert!(err.to_string().starts_with("[AnalysisFailed]"));
    }

    #[test]
    fn test_store_not_found_keeps_type() {
        let err = DetectApiError::from(StoreError::NotFound("abc".into()));
        assert_eq!(err.error_type, "NotFound");
        assert!(err.message.contains("abc"));
    }

    #[test]
    fn test_serializes_for_front_end() {
        let err = DetectApiError::video_unavailable(&VideoError::NoVideoStream);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error_type"], "VideoUnavailable");
    }
}

//! 检测结果存储：本地 JSON 缓存或 SQLite，由 `SinkConfig` 选择

pub mod error;
pub mod json_file;
pub mod sqlite;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::detection::{DetectionResult, Verdict};

pub use error::StoreError;
pub use json_file::JsonFileSink;
pub use sqlite::SqliteSink;

/// Aggregate view over stored results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
    pub total_analyzed: usize,
    pub real_detected: usize,
    pub fake_detected: usize,
    pub uncertain_results: usize,
    /// 0 when nothing has been analyzed.
    pub average_confidence: f64,
}

impl DetectionStats {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a DetectionResult>) -> Self {
        let mut stats = DetectionStats::default();
        let mut confidence_sum = 0.0;

        for result in results {
            stats.total_analyzed += 1;
            confidence_sum += result.confidence;
            match result.verdict {
                Verdict::Real => stats.real_detected += 1,
                Verdict::Fake => stats.fake_detected += 1,
                Verdict::Uncertain => stats.uncertain_results += 1,
            }
        }

        if stats.total_analyzed > 0 {
            stats.average_confidence = confidence_sum / stats.total_analyzed as f64;
        }
        stats
    }
}

/// Persists detection results. `owner` scopes records to one user; `None`
/// means records saved without an owner (for `save`) or every record (for
/// `list` and `stats`).
pub trait ResultSink: Send + Sync {
    /// Stores the result, replacing any record with the same id.
    fn save(&self, result: &DetectionResult, owner: Option<&str>) -> Result<String, StoreError>;

    /// Newest first.
    fn list(&self, owner: Option<&str>) -> Result<Vec<DetectionResult>, StoreError>;

    fn get(&self, id: &str) -> Result<DetectionResult, StoreError>;

    /// Returns the number of removed records.
    fn clear_owner(&self, owner: &str) -> Result<usize, StoreError>;

    fn clear_all(&self) -> Result<usize, StoreError>;

    fn stats(&self, owner: Option<&str>) -> Result<DetectionStats, StoreError> {
        Ok(DetectionStats::from_results(&self.list(owner)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Whole history in one JSON file.
    LocalCache { path: PathBuf },
    Sqlite { path: PathBuf },
    SqliteInMemory,
}

pub fn open_sink(config: &SinkConfig) -> Result<Box<dyn ResultSink>, StoreError> {
    let sink: Box<dyn ResultSink> = match config {
        SinkConfig::LocalCache { path } => Box::new(JsonFileSink::open(path)?),
        SinkConfig::Sqlite { path } => Box::new(SqliteSink::open(path)?),
        SinkConfig::SqliteInMemory => Box::new(SqliteSink::open_in_memory()?),
    };
    Ok(sink)
}

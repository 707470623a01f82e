use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{DetectionStats, ResultSink, StoreError};
use crate::core::detection::{DetectionResult, FeatureScores, Metadata, Verdict};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS detection_results (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        filename TEXT NOT NULL,
        verdict TEXT NOT NULL,
        confidence REAL NOT NULL,
        real_score REAL NOT NULL,
        fake_score REAL NOT NULL,
        detection_time REAL NOT NULL,
        features TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        metadata TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_detection_results_user
        ON detection_results (user_id, timestamp DESC);";

const SELECT_COLUMNS: &str = "SELECT id, filename, timestamp, real_score, fake_score, confidence,
        verdict, features, detection_time, metadata
    FROM detection_results";

/// Row as stored; JSON columns and the verdict are decoded afterwards.
struct RawRow {
    id: String,
    filename: String,
    timestamp: i64,
    real_score: f64,
    fake_score: f64,
    confidence: f64,
    verdict: String,
    features: String,
    detection_time: f64,
    metadata: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            filename: row.get(1)?,
            timestamp: row.get(2)?,
            real_score: row.get(3)?,
            fake_score: row.get(4)?,
            confidence: row.get(5)?,
            verdict: row.get(6)?,
            features: row.get(7)?,
            detection_time: row.get(8)?,
            metadata: row.get(9)?,
        })
    }

    fn into_result(self) -> Result<DetectionResult, StoreError> {
        let verdict: Verdict = self
            .verdict
            .parse()
            .map_err(|err: String| StoreError::InvalidRecord(format!("{}: {}", self.id, err)))?;
        let features: FeatureScores = serde_json::from_str(&self.features)?;
        let metadata: Metadata = serde_json::from_str(&self.metadata)?;

        Ok(DetectionResult {
            id: self.id,
            filename: self.filename,
            timestamp: self.timestamp,
            real_score: self.real_score,
            fake_score: self.fake_score,
            confidence: self.confidence,
            verdict,
            features,
            detection_time: self.detection_time,
            metadata,
        })
    }
}

/// 关系型存储：`detection_results` 表
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        info!("Result database at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ResultSink for SqliteSink {
    fn save(&self, result: &DetectionResult, owner: Option<&str>) -> Result<String, StoreError> {
        let features = serde_json::to_string(&result.features)?;
        let metadata = serde_json::to_string(&result.metadata)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO detection_results
                (id, user_id, filename, verdict, confidence, real_score, fake_score,
                 detection_time, features, timestamp, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                result.id,
                owner,
                result.filename,
                result.verdict.as_str(),
                result.confidence,
                result.real_score,
                result.fake_score,
                result.detection_time,
                features,
                result.timestamp,
                metadata,
            ],
        )?;
        Ok(result.id.clone())
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<DetectionResult>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR user_id = ?1) ORDER BY timestamp DESC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![owner], RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawRow::into_result).collect()
    }

    fn get(&self, id: &str) -> Result<DetectionResult, StoreError> {
        let row = self
            .conn()
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                RawRow::from_row,
            )
            .optional()?;
        match row {
            Some(row) => row.into_result(),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    fn clear_owner(&self, owner: &str) -> Result<usize, StoreError> {
        Ok(self
            .conn()
            .execute("DELETE FROM detection_results WHERE user_id = ?1", params![owner])?)
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        Ok(self.conn().execute("DELETE FROM detection_results", [])?)
    }

    fn stats(&self, owner: Option<&str>) -> Result<DetectionStats, StoreError> {
        let (total, real, fake, uncertain, average): (i64, i64, i64, i64, f64) =
            self.conn().query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(verdict = 'real'), 0),
                        COALESCE(SUM(verdict = 'fake'), 0),
                        COALESCE(SUM(verdict = 'uncertain'), 0),
                        COALESCE(AVG(confidence), 0.0)
                 FROM detection_results
                 WHERE (?1 IS NULL OR user_id = ?1)",
                params![owner],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

        Ok(DetectionStats {
            total_analyzed: total as usize,
            real_detected: real as usize,
            fake_detected: fake as usize,
            uncertain_results: uncertain as usize,
            average_confidence: average,
        })
    }
}

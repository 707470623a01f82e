use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Result serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored record is invalid: {0}")]
    InvalidRecord(String),
    #[error("No result with id {0}")]
    NotFound(String),
}

use crate::ai::types::AiError;
use thiserror::Error;

/// Failures from the data, index and sync layers.
///
/// Tool implementations turn these into plain-text error results; HTTP
/// handlers turn them into JSON error bodies.
#[derive(Debug, Error)]
pub enum PromoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model API error: {0}")]
    Ai(#[from] AiError),

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for PromoError {
    fn from(e: tokio::task::JoinError) -> Self {
        PromoError::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PromoError>;

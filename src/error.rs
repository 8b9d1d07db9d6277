//! Error types for rss2db.

use thiserror::Error;

/// Common error type for rss2db.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Database error.
    ///
    /// Generic wrapper for errors from either database backend.
    /// Errors from sqlx are converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed could not be fetched (network failure, bad status, oversize body).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The feed document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Schema inspection or repair failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// Clearing or inserting feed items failed.
    #[error("write error: {0}")]
    Write(String),

    /// Validation error for configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::Database(e.to_string())
    }
}

/// Result type alias for rss2db operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Render an error together with every `source()` beneath it.
///
/// Sources whose message repeats the previous level are skipped.
pub fn describe_error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        let message = cause.to_string();
        if parts.last().map(|last| last.contains(&message)) != Some(true) {
            parts.push(message);
        }
        current = cause.source();
    }
    parts.join(": ")
}

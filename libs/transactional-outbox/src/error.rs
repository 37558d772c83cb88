//! Error types for the transactional outbox library.

use error_types::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Errors that can occur during outbox operations.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record not found in the outbox
    #[error("outbox record not found: {0}")]
    RecordNotFound(Uuid),

    /// Unknown status text in the database
    #[error("invalid outbox status: {0}")]
    InvalidStatus(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<OutboxError> for AppError {
    fn from(err: OutboxError) -> Self {
        match err {
            OutboxError::Database(e) => AppError::Database(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Outcome classification for a publish attempt, as seen by the dispatcher.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Broker unreachable or not confirming; the row stays PENDING and the
    /// dispatcher backs off and retries.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Logical failure that retrying cannot fix; the row becomes FAILED.
    #[error("terminal failure: {0}")]
    Terminal(String),
}

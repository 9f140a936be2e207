use std::io;
use thiserror::Error;

/// Application-wide error type, consolidating all possible errors into a single enum.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Represents errors originating from the database, typically from `sqlx`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents standard input/output errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Represents failures reported by an external collaborator (history source,
    /// profile store, reasoner, prompt renderer, generation service, style assist).
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Represents data validation errors (e.g., invalid input format).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents configuration-related errors (e.g., missing environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl Clone for PipelineError {
    fn clone(&self) -> Self {
        match self {
            PipelineError::Database(e) => {
                PipelineError::Database(sqlx::Error::Protocol(e.to_string()))
            }
            PipelineError::Io(e) => PipelineError::Io(io::Error::new(e.kind(), e.to_string())),
            PipelineError::Collaborator(s) => PipelineError::Collaborator(s.clone()),
            PipelineError::Validation(s) => PipelineError::Validation(s.clone()),
            PipelineError::Config(s) => PipelineError::Config(s.clone()),
            PipelineError::Internal(s) => PipelineError::Internal(s.clone()),
            PipelineError::Timeout(s) => PipelineError::Timeout(s.clone()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for PipelineError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        PipelineError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Validation(format!("JSON error: {}", err))
    }
}

impl From<chrono::ParseError> for PipelineError {
    fn from(err: chrono::ParseError) -> Self {
        PipelineError::Validation(format!("Date parse error: {}", err))
    }
}

//! Structured error types for the retrieval and routing core.
//!
//! Every error carries a machine-readable `code()` in addition to its
//! `Display` message, so HTTP handlers and CLI commands can map failures to
//! stable identifiers without string-matching on messages.

use thiserror::Error;

/// Errors surfaced by the vector store, keyword index, and routing pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage corrupt: {0}")]
    Corrupt(String),

    #[error("embedder error: {0}")]
    Embedder(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl CoreError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::DimensionMismatch { .. } => "dimension_mismatch",
            CoreError::SchemaMismatch(_) => "schema_mismatch",
            CoreError::TableNotFound(_) => "table_not_found",
            CoreError::Io(_) => "io_error",
            CoreError::Corrupt(_) => "corrupt",
            CoreError::Embedder(_) => "embedder_error",
            CoreError::DeadlineExceeded => "deadline_exceeded",
            CoreError::Conflict(_) => "conflict",
            CoreError::Database(_) => "io_error",
        }
    }

    /// Whether a caller may retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Io(_) | CoreError::Database(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

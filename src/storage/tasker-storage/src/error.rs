//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry violates a uniqueness constraint.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// Could not open or reach the backend.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A query failed to execute.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Caller supplied an invalid value.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

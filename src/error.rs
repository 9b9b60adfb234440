//! Error types for Noema

use thiserror::Error;

/// Main error type for the memory engine
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Vector backend call failed or the backend is unreachable
    #[error("Backend error: {0}")]
    Backend(String),

    /// Embedding generation failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Lookup target does not exist (raised for malformed input, not empty reads)
    #[error("Not found: {0}")]
    NotFound(String),

    /// An id string could not be parsed as a UUID
    #[error("Invalid id: {0}")]
    InvalidId(#[from] uuid::Error),

    /// Invalid argument or state
    #[error("Validation error: {0}")]
    Validation(String),

    /// Destructive operation attempted without the explicit confirmation flag
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Payload serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MemoryError>;

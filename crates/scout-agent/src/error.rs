//! Error types for scout-agent

use thiserror::Error;

/// Result type alias using scout-agent Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The LLM provider failed
    #[error("provider error: {0}")]
    Provider(#[from] scout_ai::Error),

    /// The loop exhausted its round budget with nothing to return
    #[error("max iterations reached")]
    MaxIterations,

    /// The request was cancelled
    #[error("request cancelled")]
    Cancelled,

    /// Conversation persistence failed
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

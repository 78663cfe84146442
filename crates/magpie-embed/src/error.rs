//! Error types for embedding operations.

use thiserror::Error;

/// Errors that can occur when talking to an embedding service.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// The service could not be reached at all.
    #[error("Embedding service is unreachable at {url}")]
    Unavailable { url: String },

    /// Request timeout.
    #[error("Embedding request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// The service answered with an error status.
    #[error("Embedding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The service returned fewer vectors than inputs.
    #[error("Embedding service returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for embedding operations.
pub type EmbedResult<T> = Result<T, EmbedError>;

//! Error types for the vector store gateway.

use thiserror::Error;

/// Errors that can occur against the vector database.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Point not found: {0}")]
    PointNotFound(String),

    #[error("Vector database API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Embedding gateway error: {0}")]
    Embedding(#[from] magpie_embed::EmbedError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for vector store operations.
pub type VectorResult<T> = Result<T, VectorError>;

//! Error types for the chunking engine.

use thiserror::Error;

/// Result type for chunking operations.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors that can occur while chunking a document.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("No content could be extracted from the document")]
    NoContent,

    #[error("Embedding gateway error: {0}")]
    Embedding(#[from] magpie_embed::EmbedError),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("OCR tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

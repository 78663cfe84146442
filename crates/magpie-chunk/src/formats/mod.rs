//! Per-format chunkers behind a common trait.

mod csv;
mod markdown;
mod pdf;
mod text;

pub(crate) use csv::CsvChunker;
pub(crate) use markdown::{chunk_markdown_text, MarkdownChunker};
pub(crate) use pdf::PdfChunker;
pub(crate) use text::TextChunker;

use crate::error::ChunkResult;
use async_trait::async_trait;

/// Turns one document format's raw bytes into ordered chunk texts.
#[async_trait]
pub trait FormatChunker: Send + Sync {
    async fn chunk(&self, bytes: &[u8]) -> ChunkResult<Vec<String>>;
}

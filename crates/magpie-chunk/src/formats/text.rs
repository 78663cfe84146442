//! Plain-text chunker.

use super::FormatChunker;
use crate::error::ChunkResult;
use crate::splitter::TextSplitter;
use async_trait::async_trait;
use std::sync::Arc;

/// Chunker for `.txt` uploads.
pub struct TextChunker {
    splitter: Arc<TextSplitter>,
}

impl TextChunker {
    pub fn new(splitter: Arc<TextSplitter>) -> Self {
        Self { splitter }
    }
}

#[async_trait]
impl FormatChunker for TextChunker {
    async fn chunk(&self, bytes: &[u8]) -> ChunkResult<Vec<String>> {
        let text = String::from_utf8_lossy(bytes);
        Ok(self.splitter.chunk_plain_text(&text).await?)
    }
}

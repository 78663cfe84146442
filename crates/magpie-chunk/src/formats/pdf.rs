//! PDF chunker: structured extraction with an OCR fallback for scanned files.

use super::FormatChunker;
use crate::error::{ChunkError, ChunkResult};
use crate::ocr;
use crate::splitter::TextSplitter;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Chunker for `.pdf` uploads.
pub struct PdfChunker {
    splitter: Arc<TextSplitter>,
}

impl PdfChunker {
    pub fn new(splitter: Arc<TextSplitter>) -> Self {
        Self { splitter }
    }
}

#[async_trait]
impl FormatChunker for PdfChunker {
    async fn chunk(&self, bytes: &[u8]) -> ChunkResult<Vec<String>> {
        let raw = bytes.to_vec();
        let extracted = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&raw).map_err(|e| ChunkError::Pdf(e.to_string()))
        })
        .await
        .map_err(|e| ChunkError::Pdf(e.to_string()))?;

        let chunks = match extracted {
            Ok(text) if !text.trim().is_empty() => self.splitter.chunk_plain_text(&text).await?,
            _ => Vec::new(),
        };

        if !chunks.is_empty() {
            return Ok(chunks);
        }

        // Scanned or image-only PDF: rasterize and OCR each page
        debug!("Structured extraction yielded nothing, falling back to OCR");
        let raw = bytes.to_vec();
        let ocr_text = tokio::task::spawn_blocking(move || ocr::ocr_pdf(&raw))
            .await
            .map_err(|e| ChunkError::Ocr(e.to_string()))??;

        if ocr_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(self.splitter.chunk_plain_text(&ocr_text).await?)
    }
}

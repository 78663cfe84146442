//! Format dispatch for the chunking engine.

use crate::error::{ChunkError, ChunkResult};
use crate::formats::{
    chunk_markdown_text, CsvChunker, FormatChunker, MarkdownChunker, PdfChunker, TextChunker,
};
use crate::splitter::TextSplitter;
use magpie_core::DocumentFormat;
use magpie_embed::TokenCounter;
use std::sync::Arc;
use tracing::debug;

/// Turns raw document bytes and crawled markdown into embedding-ready chunks.
pub struct ChunkingEngine {
    splitter: Arc<TextSplitter>,
    counter: Arc<dyn TokenCounter>,
    window: usize,
}

impl ChunkingEngine {
    pub fn new(counter: Arc<dyn TokenCounter>, window: usize) -> Self {
        let splitter = Arc::new(TextSplitter::new(counter.clone(), window));
        Self {
            splitter,
            counter,
            window,
        }
    }

    /// Chunk a document of the given format.
    ///
    /// Returns [`ChunkError::NoContent`] when every extraction path comes up
    /// empty; callers treat that as a per-document failure.
    pub async fn chunk_document(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> ChunkResult<Vec<String>> {
        let chunker: Box<dyn FormatChunker> = match format {
            DocumentFormat::Pdf => Box::new(PdfChunker::new(self.splitter.clone())),
            DocumentFormat::Txt => Box::new(TextChunker::new(self.splitter.clone())),
            DocumentFormat::Csv => Box::new(CsvChunker::new(self.counter.clone(), self.window)),
            DocumentFormat::Markdown => Box::new(MarkdownChunker::new(self.splitter.clone())),
        };

        let chunks = chunker.chunk(bytes).await?;
        debug!("Chunked {} document into {} chunks", format, chunks.len());

        if chunks.is_empty() {
            return Err(ChunkError::NoContent);
        }
        Ok(chunks)
    }

    /// Chunk crawled markdown. An empty result is not an error here; a page
    /// with no usable prose simply contributes nothing.
    pub async fn chunk_markdown(&self, markdown: &str) -> ChunkResult<Vec<String>> {
        Ok(chunk_markdown_text(&self.splitter, markdown).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use magpie_embed::EmbedError;

    struct WordCounter;

    #[async_trait]
    impl TokenCounter for WordCounter {
        async fn count(&self, text: &str) -> Result<usize, EmbedError> {
            Ok(text.split_whitespace().count())
        }

        async fn count_many(&self, texts: &[String]) -> Result<Vec<usize>, EmbedError> {
            Ok(texts.iter().map(|t| t.split_whitespace().count()).collect())
        }
    }

    fn engine(window: usize) -> ChunkingEngine {
        ChunkingEngine::new(Arc::new(WordCounter), window)
    }

    #[tokio::test]
    async fn test_txt_document_single_chunk() {
        let text = "A short paragraph that easily fits the embedding window \
                    and is long enough to pass the minimum length filter.";
        let chunks = engine(100).chunk_document(text.as_bytes(), DocumentFormat::Txt).await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_txt_is_no_content() {
        let err = engine(100)
            .chunk_document(b"   \n ", DocumentFormat::Txt)
            .await
            .unwrap_err();
        assert!(matches!(err, ChunkError::NoContent));
    }

    #[tokio::test]
    async fn test_csv_document_keeps_header() {
        let csv = "city,fact\nlondon,this row has a handful of words in it\n";
        let chunks = engine(100).chunk_document(csv.as_bytes(), DocumentFormat::Csv).await.unwrap();
        assert!(chunks[0].starts_with("city | fact"));
    }

    #[tokio::test]
    async fn test_markdown_sections_survive() {
        let md = "# One\n\nThe first section carries enough words to pass every \
                  quality filter comfortably, including the length floor.\n\n\
                  ## Two\n\nThe second section also carries enough prose to get \
                  through the minimum character filter on its own.";
        let chunks = engine(1000).chunk_markdown(md).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("# One"));
        assert!(chunks[1].starts_with("## Two"));
    }

    #[tokio::test]
    async fn test_headerless_markdown_uses_text_pipeline() {
        let md = "Plain prose without any headers, still long enough that the \
                  fifty character floor does not discard it outright.";
        let chunks = engine(1000).chunk_markdown(md).await.unwrap();
        assert_eq!(chunks.len(), 1);
        // The text pipeline normalizes whitespace
        assert!(!chunks[0].contains('\n'));
    }
}

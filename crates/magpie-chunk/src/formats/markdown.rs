//! Markdown chunker: header-based sectioning with a plain-text fallback.

use super::FormatChunker;
use crate::error::ChunkResult;
use crate::splitter::{passes_quality_filters, TextSplitter};
use async_trait::async_trait;
use magpie_embed::EmbedResult;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use std::sync::Arc;

/// Split a markdown document into sections at level-1 and level-2 headers.
///
/// Headers stay attached to their section. Returns an empty vector when the
/// document has no such headers, signalling the caller to fall back to plain
/// text splitting.
pub(crate) fn split_by_headers(markdown: &str) -> Vec<String> {
    let mut starts = Vec::new();
    for (event, range) in Parser::new(markdown).into_offset_iter() {
        if let Event::Start(Tag::Heading(level, _, _)) = event {
            if matches!(level, HeadingLevel::H1 | HeadingLevel::H2) {
                starts.push(range.start);
            }
        }
    }

    if starts.is_empty() {
        return Vec::new();
    }

    let mut sections = Vec::new();
    let preamble = markdown[..starts[0]].trim();
    if !preamble.is_empty() {
        sections.push(preamble.to_string());
    }

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(markdown.len());
        let section = markdown[start..end].trim();
        if !section.is_empty() {
            sections.push(section.to_string());
        }
    }

    sections
}

/// Chunk crawled markdown: header sections first, oversized sections through
/// the plain-text splitter, whole document through it when headerless.
pub(crate) async fn chunk_markdown_text(
    splitter: &TextSplitter,
    markdown: &str,
) -> EmbedResult<Vec<String>> {
    let sections = split_by_headers(markdown);
    if sections.is_empty() {
        return splitter.chunk_plain_text(markdown).await;
    }

    let mut out = Vec::new();
    for section in sections {
        let sub = splitter.chunk_text(&section).await?;
        out.extend(sub.into_iter().filter(|c| passes_quality_filters(c)));
    }
    Ok(out)
}

/// Chunker for markdown uploads.
pub struct MarkdownChunker {
    splitter: Arc<TextSplitter>,
}

impl MarkdownChunker {
    pub fn new(splitter: Arc<TextSplitter>) -> Self {
        Self { splitter }
    }
}

#[async_trait]
impl FormatChunker for MarkdownChunker {
    async fn chunk(&self, bytes: &[u8]) -> ChunkResult<Vec<String>> {
        let text = String::from_utf8_lossy(bytes);
        Ok(chunk_markdown_text(&self.splitter, &text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_h1_and_h2() {
        let md = "# Intro\n\nsome intro text\n\n## Details\n\nmore text\n\n### Deep\n\nignored split";
        let sections = split_by_headers(md);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].starts_with("# Intro"));
        assert!(sections[1].starts_with("## Details"));
        // H3 stays inside its parent section
        assert!(sections[1].contains("### Deep"));
    }

    #[test]
    fn test_preamble_becomes_own_section() {
        let md = "leading text before any header\n\n# First\n\nbody";
        let sections = split_by_headers(md);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], "leading text before any header");
    }

    #[test]
    fn test_no_headers_returns_empty() {
        let sections = split_by_headers("just a paragraph\n\nand another one");
        assert!(sections.is_empty());
    }
}

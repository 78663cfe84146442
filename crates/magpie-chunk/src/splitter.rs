//! Token-budget text splitting.
//!
//! The splitter sizes segments through the embedding gateway's tokenizer so
//! that every produced chunk fits the dense model's window.

use magpie_embed::{EmbedResult, TokenCounter};
use std::sync::Arc;

/// Characters that, alone, mark a chunk as a table separator row.
const TABLE_SEPARATOR_CHARS: &str = "|-: ";

/// Minimum characters a chunk must have to be worth persisting.
const MIN_CHUNK_CHARS: usize = 50;

/// Default character overlap between adjacent windows.
pub const DEFAULT_OVERLAP: usize = 100;

/// Splits text into windows that fit the embedding token budget.
pub struct TextSplitter {
    counter: Arc<dyn TokenCounter>,
    window: usize,
    overlap: usize,
}

impl TextSplitter {
    pub fn new(counter: Arc<dyn TokenCounter>, window: usize) -> Self {
        Self {
            counter,
            window,
            overlap: DEFAULT_OVERLAP,
        }
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Split `text` into chunks that each fit the token window.
    ///
    /// Chunks that still exceed the window after one pass are split again
    /// until they fit or can no longer be divided.
    pub async fn chunk_text(&self, text: &str) -> EmbedResult<Vec<String>> {
        let tokens = self.counter.count(text).await?;
        if tokens < self.window {
            return Ok(vec![text.to_string()]);
        }

        let segments = tokens.div_ceil(self.window);
        let parts = split_into_windows(text, segments, self.overlap);
        if parts.len() <= 1 {
            return Ok(vec![text.to_string()]);
        }

        let mut out = Vec::new();
        for part in parts {
            let sub = Box::pin(self.chunk_text(&part)).await?;
            out.extend(sub);
        }
        Ok(out)
    }

    /// Full plain-text pipeline: normalize, split, and quality-filter.
    pub async fn chunk_plain_text(&self, raw: &str) -> EmbedResult<Vec<String>> {
        let text = normalize_text(raw);
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.chunk_text(&text).await?;
        Ok(chunks
            .into_iter()
            .filter(|c| passes_quality_filters(c))
            .collect())
    }
}

/// Normalize whitespace, strip code-fence markers and bare URLs.
pub fn normalize_text(text: &str) -> String {
    let text = text.replace("```", "");
    text.split_whitespace()
        .filter(|word| !word.starts_with("http://") && !word.starts_with("https://"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split the character stream into `segments` roughly equal windows with a
/// fixed character overlap between adjacent windows.
///
/// For all but the last window, the cut is pulled back to the last
/// sentence-terminal punctuation when one occurs at or beyond 80% of the
/// window's length. The final window always extends to end-of-text.
pub fn split_into_windows(text: &str, segments: usize, overlap: usize) -> Vec<String> {
    if segments <= 1 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let char_count = chars.len();
    let step = ((char_count.saturating_sub(overlap * (segments - 1))) / segments).max(1);

    let mut chunks = Vec::with_capacity(segments);
    for i in 0..segments {
        let start = (i * step).min(char_count);
        if i < segments - 1 {
            let end = (start + step + overlap).min(char_count);
            let window = &chars[start..end];

            let last_boundary = window
                .iter()
                .rposition(|&c| matches!(c, '.' | '!' | '?'));

            let chunk: String = match last_boundary {
                Some(pos) if pos as f64 > step as f64 * 0.8 => {
                    chars[start..start + pos + 1].iter().collect()
                }
                _ => window.iter().collect(),
            };
            chunks.push(chunk);
        } else {
            // Last window gets everything remaining
            chunks.push(chars[start..].iter().collect());
        }
    }

    chunks
}

/// Whether a chunk is worth persisting.
///
/// Rejects chunks under 50 characters, chunks that are only digits once
/// `.,|-` are removed, and chunks consisting solely of table-separator
/// characters.
pub fn passes_quality_filters(chunk: &str) -> bool {
    let trimmed = chunk.trim();
    if trimmed.chars().count() < MIN_CHUNK_CHARS {
        return false;
    }

    let stripped: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '|' | '-'))
        .collect();
    if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    if trimmed.chars().all(|c| TABLE_SEPARATOR_CHARS.contains(c)) {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use magpie_embed::EmbedError;

    /// Deterministic counter: one token per whitespace-separated word.
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

    #[test]
    fn test_normalize_strips_fences_and_urls() {
        let raw = "see  ```code```   here https://example.org/page and\n\nmore";
        assert_eq!(normalize_text(raw), "see code here and more");
    }

    #[test]
    fn test_two_segment_split_reconstructs_input() {
        // Matches the sentence-boundary example: 2 segments, no overlap.
        let chunks = split_into_windows("A. B. C.", 2, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), "A. B. C.");
    }

    #[test]
    fn test_split_prefers_sentence_boundary() {
        // 100 chars, 2 segments, no overlap: step = 50. A period at
        // position 45 (> 0.8 * 50) pulls the first cut back to it.
        let first = "x".repeat(45);
        let text = format!("{first}. {}", "y".repeat(52));
        let chunks = split_into_windows(&text, 2, 0);
        assert!(chunks[0].ends_with('.'));
        assert_eq!(chunks[0].chars().count(), 46);
    }

    #[test]
    fn test_split_overlap_duplicates_seam() {
        let text: String = ('a'..='z').cycle().take(300).collect();
        let chunks = split_into_windows(&text, 3, 10);
        assert_eq!(chunks.len(), 3);
        // Each non-final window carries `overlap` chars past its step.
        assert!(chunks[0].chars().count() > 90);
        // Coverage: the last window runs to end-of-text.
        assert!(text.ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn test_quality_filters() {
        assert!(!passes_quality_filters("too short"));
        assert!(!passes_quality_filters(
            "1234567890.1234567890,1234567890|1234567890-1234567890"
        ));
        // Digits separated by spaces are not caught by the digit filter.
        assert!(passes_quality_filters(
            "12 34 56 78 90 12 34 56 78 90 12 34 56 78 90 12 34 56 78 90"
        ));
        let mut separators = "| - : ".repeat(20);
        separators.push('|');
        assert!(!passes_quality_filters(&separators));
        assert!(passes_quality_filters(
            "This sentence is a perfectly reasonable chunk of prose content."
        ));
    }

    #[tokio::test]
    async fn test_below_window_returns_single_chunk() {
        let splitter = TextSplitter::new(Arc::new(WordCounter), 100);
        let text = "a handful of words well under the window";
        let chunks = splitter.chunk_text(text).await.unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[tokio::test]
    async fn test_oversized_text_covers_input() {
        let splitter = TextSplitter::new(Arc::new(WordCounter), 10).with_overlap(0);
        let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let chunks = splitter.chunk_text(&text).await.unwrap();

        assert!(chunks.len() > 1);
        // With zero overlap the concatenation must cover the whole input.
        let rejoined = chunks.concat();
        for word in &words {
            assert!(rejoined.contains(word.as_str()), "missing {word}");
        }
    }

    #[tokio::test]
    async fn test_plain_text_pipeline_normalizes_and_filters() {
        let splitter = TextSplitter::new(Arc::new(WordCounter), 1000);
        let raw = "```\nSome   prose with enough length to survive the minimum \
                   character filter applied at the end.\n```";
        let chunks = splitter.chunk_plain_text(raw).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].contains("```"));
        assert!(!chunks[0].contains('\n'));
    }
}

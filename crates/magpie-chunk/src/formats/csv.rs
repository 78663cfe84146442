//! CSV chunker: delimiter sniffing, encoding fallback, token-packed rows.

use super::FormatChunker;
use crate::error::{ChunkError, ChunkResult};
use async_trait::async_trait;
use magpie_embed::TokenCounter;
use std::sync::Arc;

/// Chunker for `.csv` uploads.
///
/// Every produced chunk starts with the header row so each one stays
/// interpretable on its own.
pub struct CsvChunker {
    counter: Arc<dyn TokenCounter>,
    window: usize,
}

impl CsvChunker {
    pub fn new(counter: Arc<dyn TokenCounter>, window: usize) -> Self {
        Self { counter, window }
    }
}

#[async_trait]
impl FormatChunker for CsvChunker {
    async fn chunk(&self, bytes: &[u8]) -> ChunkResult<Vec<String>> {
        let raw = bytes.to_vec();
        let lines = tokio::task::spawn_blocking(move || parse_lines(&raw))
            .await
            .map_err(|e| ChunkError::Csv(e.to_string()))??;

        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let counts = self.counter.count_many(&lines).await?;

        let header = &lines[0];
        let header_tokens = counts[0];

        let mut chunks = Vec::new();
        let mut current = format!("{header}\n");
        let mut current_tokens = header_tokens;

        for (line, line_tokens) in lines[1..].iter().zip(counts[1..].iter().copied()) {
            if current_tokens + line_tokens > self.window {
                chunks.push(current.trim().to_string());
                current = format!("{header}\n{line}\n");
                current_tokens = header_tokens + line_tokens;
            } else {
                current.push_str(line);
                current.push('\n');
                current_tokens += line_tokens;
            }
        }

        let tail = current.trim();
        if !tail.is_empty() {
            chunks.push(tail.to_string());
        }

        Ok(chunks)
    }
}

/// Decode, sniff the delimiter, and render header + rows as pipe-joined lines.
fn parse_lines(bytes: &[u8]) -> ChunkResult<Vec<String>> {
    let text = decode_bytes(bytes);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let delimiter = sniff_delimiter(&text);
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header_row = reader
        .headers()
        .map_err(|e| ChunkError::Csv(e.to_string()))?
        .clone();
    let header = join_cells(header_row.iter(), false);

    let mut lines = vec![header];
    for record in reader.records() {
        // A malformed row should not abort the whole file
        let record = match record {
            Ok(record) => record,
            Err(_) => continue,
        };
        let line = join_cells(record.iter(), true);
        if !line.is_empty() {
            lines.push(line);
        }
    }

    Ok(lines)
}

/// Pipe-join cells, normalizing both quote characters to an escaped quote.
fn join_cells<'a>(cells: impl Iterator<Item = &'a str>, skip_empty: bool) -> String {
    cells
        .filter(|cell| !skip_empty || !cell.is_empty())
        .map(|cell| cell.replace(['\'', '"'], "\\\""))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Decode with a fallback ladder: BOM, strict UTF-8, UTF-16 when NUL bytes
/// suggest a wide encoding, Windows-1252, then lossy UTF-8.
fn decode_bytes(bytes: &[u8]) -> String {
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let candidates: &[&'static encoding_rs::Encoding] = if bytes.contains(&0) {
        &[
            encoding_rs::UTF_16LE,
            encoding_rs::UTF_16BE,
            encoding_rs::WINDOWS_1252,
        ]
    } else {
        &[encoding_rs::WINDOWS_1252]
    };

    for encoding in candidates {
        let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// Pick the delimiter that yields the most consistent multi-column parse.
fn sniff_delimiter(text: &str) -> u8 {
    let mut best = (b',', 0usize);
    for candidate in [b',', b';', b'\t', b'|'] {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(candidate)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns = match reader.headers() {
            Ok(headers) => headers.len(),
            Err(_) => continue,
        };
        if columns < 2 {
            continue;
        }

        let consistent = reader
            .records()
            .take(10)
            .filter_map(|r| r.ok())
            .all(|r| r.len() == columns || r.len() == 0);
        if consistent && columns > best.1 {
            best = (candidate, columns);
        }
    }
    best.0
}

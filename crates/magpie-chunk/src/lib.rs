//! Magpie Chunk - Multi-format chunking engine.
//!
//! Turns raw document bytes and crawled markdown into token-bounded text
//! segments ready for embedding. Format handling is dispatched over
//! [`FormatChunker`] implementations, one per supported input kind.

mod engine;
mod error;
mod formats;
mod ocr;
mod splitter;

pub use engine::ChunkingEngine;
pub use error::{ChunkError, ChunkResult};
pub use formats::FormatChunker;
pub use splitter::{normalize_text, passes_quality_filters, split_into_windows, TextSplitter};

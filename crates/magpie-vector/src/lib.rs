//! Magpie Vector - Gateway to the Qdrant hybrid vector store.
//!
//! Owns collection lifecycle, batched hybrid upserts, RRF-fused retrieval,
//! and point maintenance (browse, edit, delete, ID repair).

mod error;
mod qdrant;
mod store;
mod types;

pub use error::{VectorError, VectorResult};
pub use qdrant::QdrantClient;
pub use store::{decode_source_candidates, RepairReport, VectorStore};
pub use types::*;

//! Magpie Embed - HTTP gateway to the dense and sparse embedding services.

mod client;
mod counter;
mod error;
mod types;

pub use client::{DenseClient, SparseClient};
pub use counter::TokenCounter;
pub use error::{EmbedError, EmbedResult};
pub use types::*;

//! Token counting abstraction used by the chunking engine.

use crate::client::DenseClient;
use crate::error::EmbedResult;
use async_trait::async_trait;

/// Counts tokens the way the dense embedding model will.
///
/// The chunking engine sizes its segments through this trait so it can be
/// exercised with a deterministic counter in tests.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count(&self, text: &str) -> EmbedResult<usize>;

    async fn count_many(&self, texts: &[String]) -> EmbedResult<Vec<usize>>;
}

#[async_trait]
impl TokenCounter for DenseClient {
    async fn count(&self, text: &str) -> EmbedResult<usize> {
        self.count_tokens_one(text).await
    }

    async fn count_many(&self, texts: &[String]) -> EmbedResult<Vec<usize>> {
        self.count_tokens(texts).await
    }
}

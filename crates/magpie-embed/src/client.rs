//! HTTP clients for the dense and sparse embedding services.

use crate::error::{EmbedError, EmbedResult};
use crate::types::*;
use magpie_config::EmbeddingConfig;
use magpie_core::SparseVector;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for the dense embedding service.
///
/// Exposes both `/embed` and `/tokenize`; token counting lives here because
/// the chunking window is defined by the dense model.
#[derive(Clone)]
pub struct DenseClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DenseClient {
    /// Create a new client from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> EmbedResult<Self> {
        Self::new(&config.dense_url, config.timeout_seconds)
    }

    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> EmbedResult<Self> {
        let timeout = Duration::from_secs(timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EmbedError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Compute dense embeddings for a batch of texts.
    pub async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let url = format!("{}/embed", self.base_url);
        debug!("Requesting {} dense embeddings", texts.len());

        let response: DenseEmbedResponse =
            post_json(&self.client, &url, texts, self.timeout).await?;

        if response.vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: response.vectors.len(),
            });
        }
        Ok(response.vectors)
    }

    /// Count tokens for a batch of texts.
    pub async fn count_tokens(&self, texts: &[String]) -> EmbedResult<Vec<usize>> {
        let url = format!("{}/tokenize", self.base_url);

        let response: TokenizeResponse =
            post_json(&self.client, &url, texts, self.timeout).await?;

        if response.counts.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: response.counts.len(),
            });
        }
        Ok(response.counts)
    }

    /// Count tokens for a single text.
    pub async fn count_tokens_one(&self, text: &str) -> EmbedResult<usize> {
        let inputs = vec![text.to_string()];
        let counts = self.count_tokens(&inputs).await?;
        Ok(counts[0])
    }
}

/// Client for the sparse embedding service.
#[derive(Clone)]
pub struct SparseClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl SparseClient {
    /// Create a new client from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> EmbedResult<Self> {
        Self::new(&config.sparse_url, config.timeout_seconds)
    }

    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> EmbedResult<Self> {
        let timeout = Duration::from_secs(timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EmbedError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Compute sparse embeddings for a batch of texts.
    pub async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<SparseVector>> {
        let url = format!("{}/embed", self.base_url);
        debug!("Requesting {} sparse embeddings", texts.len());

        let response: SparseEmbedResponse =
            post_json(&self.client, &url, texts, self.timeout).await?;

        if response.vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: response.vectors.len(),
            });
        }
        Ok(response.vectors)
    }
}

/// POST `{inputs}` and decode the JSON response, mapping transport failures
/// to the gateway's error taxonomy.
async fn post_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    texts: &[String],
    timeout: Duration,
) -> EmbedResult<T> {
    let request = InputsRequest::new(texts.to_vec());

    let response = client
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            if e.is_connect() {
                EmbedError::Unavailable {
                    url: url.to_string(),
                }
            } else if e.is_timeout() {
                EmbedError::Timeout {
                    seconds: timeout.as_secs(),
                }
            } else {
                EmbedError::Http(e)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(EmbedError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}

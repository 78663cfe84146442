//! Types for the embedding service wire contract.

use magpie_core::SparseVector;
use serde::{Deserialize, Serialize};

/// Request body shared by the `/embed` and `/tokenize` endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct InputsRequest {
    pub inputs: Vec<String>,
}

impl InputsRequest {
    pub fn new(inputs: Vec<String>) -> Self {
        Self { inputs }
    }
}

/// Response from the dense `/embed` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DenseEmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

/// Response from the sparse `/embed` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SparseEmbedResponse {
    pub vectors: Vec<SparseVector>,
}

/// Response from the `/tokenize` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenizeResponse {
    pub counts: Vec<usize>,
}

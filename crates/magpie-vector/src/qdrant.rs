//! Typed client for the Qdrant REST contract.

use crate::error::{VectorError, VectorResult};
use crate::types::*;
use magpie_config::QdrantConfig;
use magpie_core::SparseVector;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Every Qdrant response wraps its payload in a `result` field.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<PointRecord>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<ScoredPoint>,
}

/// Low-level client for Qdrant's collection, point, and query endpoints.
#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantClient {
    pub fn from_config(config: &QdrantConfig) -> VectorResult<Self> {
        Self::new(&config.url, config.api_key.clone())
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> VectorResult<Self> {
        let client = Client::builder().build().map_err(VectorError::Http)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        collection: &str,
    ) -> VectorResult<T> {
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(VectorError::CollectionNotFound(collection.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VectorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.result)
    }

    /// Whether a collection exists.
    pub async fn collection_exists(&self, name: &str) -> VectorResult<bool> {
        let result: ExistsResult = self
            .send(
                self.request(Method::GET, &format!("/collections/{name}/exists")),
                name,
            )
            .await?;
        Ok(result.exists)
    }

    /// Create a hybrid collection: one dense sub-vector (cosine) and one
    /// in-memory sparse sub-vector.
    pub async fn create_collection(&self, name: &str, dense_dimension: usize) -> VectorResult<()> {
        let body = json!({
            "vectors": {
                "dense": { "size": dense_dimension, "distance": "Cosine" }
            },
            "sparse_vectors": {
                "sparse": { "index": { "on_disk": false } }
            }
        });

        let _: bool = self
            .send(
                self.request(Method::PUT, &format!("/collections/{name}")).json(&body),
                name,
            )
            .await?;
        debug!("Created collection {name}");
        Ok(())
    }

    /// Drop a collection and all of its points.
    pub async fn delete_collection(&self, name: &str) -> VectorResult<()> {
        let _: bool = self
            .send(
                self.request(Method::DELETE, &format!("/collections/{name}")),
                name,
            )
            .await?;
        Ok(())
    }

    /// Upsert a batch of points.
    pub async fn upsert(&self, name: &str, points: &[PointStruct]) -> VectorResult<()> {
        let body = json!({ "points": points });
        let _: Value = self
            .send(
                self.request(Method::PUT, &format!("/collections/{name}/points"))
                    .query(&[("wait", "true")])
                    .json(&body),
                name,
            )
            .await?;
        Ok(())
    }

    /// Number of points in a collection.
    pub async fn count(&self, name: &str) -> VectorResult<usize> {
        let result: CountResult = self
            .send(
                self.request(Method::POST, &format!("/collections/{name}/points/count"))
                    .json(&json!({ "exact": true })),
                name,
            )
            .await?;
        Ok(result.count)
    }

    /// Scroll points, optionally filtered, with payloads and vectors.
    pub async fn scroll(
        &self,
        name: &str,
        filter: Option<Value>,
        limit: usize,
        with_vectors: bool,
    ) -> VectorResult<Vec<PointRecord>> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": with_vectors,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let result: ScrollResult = self
            .send(
                self.request(Method::POST, &format!("/collections/{name}/points/scroll"))
                    .json(&body),
                name,
            )
            .await?;
        Ok(result.points)
    }

    /// Retrieve specific points by id.
    pub async fn retrieve(&self, name: &str, ids: &[StoredPointId]) -> VectorResult<Vec<PointRecord>> {
        let body = json!({ "ids": ids, "with_payload": true, "with_vector": false });
        let result: Vec<PointRecord> = self
            .send(
                self.request(Method::POST, &format!("/collections/{name}/points"))
                    .json(&body),
                name,
            )
            .await?;
        Ok(result)
    }

    /// Delete points by id.
    pub async fn delete_points(&self, name: &str, ids: &[StoredPointId]) -> VectorResult<()> {
        let body = json!({ "points": ids });
        let _: Value = self
            .send(
                self.request(Method::POST, &format!("/collections/{name}/points/delete"))
                    .query(&[("wait", "true")])
                    .json(&body),
                name,
            )
            .await?;
        Ok(())
    }

    /// Overwrite the full payload of the given points.
    pub async fn overwrite_payload(
        &self,
        name: &str,
        ids: &[StoredPointId],
        payload: &PointPayload,
    ) -> VectorResult<()> {
        let body = json!({ "payload": payload, "points": ids });
        let _: Value = self
            .send(
                self.request(Method::PUT, &format!("/collections/{name}/points/payload"))
                    .json(&body),
                name,
            )
            .await?;
        Ok(())
    }

    /// Replace the named vectors of a point in place.
    pub async fn update_vectors(
        &self,
        name: &str,
        id: &StoredPointId,
        dense: Vec<f32>,
        sparse: SparseVector,
    ) -> VectorResult<()> {
        let body = json!({
            "points": [{
                "id": id,
                "vector": { "dense": dense, "sparse": sparse }
            }]
        });
        let _: Value = self
            .send(
                self.request(Method::PUT, &format!("/collections/{name}/points/vectors"))
                    .json(&body),
                name,
            )
            .await?;
        Ok(())
    }

    /// Hybrid query: prefetch both sub-vectors independently, fuse with RRF.
    pub async fn query_fused(
        &self,
        name: &str,
        dense: Vec<f32>,
        sparse: SparseVector,
        prefetch_limit: usize,
        fused_limit: usize,
    ) -> VectorResult<Vec<ScoredPoint>> {
        let body = json!({
            "prefetch": [
                { "query": sparse, "using": "sparse", "limit": prefetch_limit },
                { "query": dense, "using": "dense", "limit": prefetch_limit }
            ],
            "query": { "fusion": "rrf" },
            "limit": fused_limit,
            "with_payload": true,
        });

        let result: QueryResult = self
            .send(
                self.request(Method::POST, &format!("/collections/{name}/points/query"))
                    .json(&body),
                name,
            )
            .await?;
        Ok(result.points)
    }
}

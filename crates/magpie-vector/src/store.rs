//! High-level vector store operations built on the Qdrant client.

use crate::error::{VectorError, VectorResult};
use crate::qdrant::QdrantClient;
use crate::types::*;
use magpie_core::{emit, ProgressSender, ProgressUpdate};
use magpie_embed::{DenseClient, SparseClient};
use percent_encoding::percent_decode_str;
use serde_json::json;
use tracing::{debug, info, warn};

/// Default number of fused results returned by a hybrid query.
pub const DEFAULT_FUSED_LIMIT: usize = 10;

/// Default number of candidates prefetched per sub-vector before fusion.
pub const DEFAULT_PREFETCH_LIMIT: usize = 20;

/// Outcome of an ID repair pass. Errors are accumulated, never raised.
#[derive(Debug, Default)]
pub struct RepairReport {
    pub fixed_count: usize,
    pub errors: Vec<String>,
}

/// Gateway owning collection lifecycle, hybrid upsert and retrieval, and
/// point maintenance.
#[derive(Clone)]
pub struct VectorStore {
    qdrant: QdrantClient,
    dense: DenseClient,
    sparse: SparseClient,
    dimension: usize,
}

impl VectorStore {
    pub fn new(
        qdrant: QdrantClient,
        dense: DenseClient,
        sparse: SparseClient,
        dimension: usize,
    ) -> Self {
        Self {
            qdrant,
            dense,
            sparse,
            dimension,
        }
    }

    /// Create a hybrid collection. No-op when it already exists.
    pub async fn create_collection(&self, name: &str) -> VectorResult<()> {
        if self.qdrant.collection_exists(name).await? {
            debug!("Collection {name} already exists");
            return Ok(());
        }
        self.qdrant.create_collection(name, self.dimension).await?;
        info!("Created collection {name}");
        Ok(())
    }

    /// Embed and upsert chunks grouped by source, in batches, emitting a
    /// progress event after each stored batch.
    ///
    /// Every point gets a freshly generated identifier; ids are never reused
    /// across calls.
    pub async fn upsert_points(
        &self,
        name: &str,
        sources_to_chunks: &[(String, Vec<String>)],
        batch_size: usize,
        progress: Option<&ProgressSender>,
    ) -> VectorResult<()> {
        let batch_size = batch_size.max(1);
        let total: u64 = sources_to_chunks
            .iter()
            .map(|(_, chunks)| chunks.len() as u64)
            .sum();
        let mut processed: u64 = 0;

        for (source, chunks) in sources_to_chunks {
            let texts: Vec<String> = chunks
                .iter()
                .map(|chunk| format!("Source: {source}\nContent: {chunk}"))
                .collect();

            for batch in texts.chunks(batch_size) {
                let dense_vectors = self.dense.embed(batch).await?;
                let sparse_vectors = self.sparse.embed(batch).await?;

                let points: Vec<PointStruct> = batch
                    .iter()
                    .zip(dense_vectors)
                    .zip(sparse_vectors)
                    .map(|((text, dense), sparse)| {
                        PointStruct::new(
                            dense,
                            sparse,
                            PointPayload {
                                source: source.clone(),
                                text: text.clone(),
                            },
                        )
                    })
                    .collect();

                self.qdrant.upsert(name, &points).await?;
                processed += points.len() as u64;

                if let Some(sender) = progress {
                    emit(
                        sender,
                        ProgressUpdate::new(processed, total, "Calculating embeddings."),
                    );
                }
            }
        }

        info!("Upserted {processed} points into {name}");
        Ok(())
    }

    /// Hybrid retrieval with the default fused and prefetch limits.
    pub async fn query(&self, name: &str, question: &str) -> VectorResult<Vec<String>> {
        self.query_hybrid(name, question, DEFAULT_FUSED_LIMIT, DEFAULT_PREFETCH_LIMIT)
            .await
    }

    /// Hybrid retrieval: prefetch dense and sparse candidates independently,
    /// fuse with RRF, return payload texts in fused-rank order.
    pub async fn query_hybrid(
        &self,
        name: &str,
        question: &str,
        fused_limit: usize,
        prefetch_limit: usize,
    ) -> VectorResult<Vec<String>> {
        let inputs = vec![question.to_string()];
        let dense = self.dense.embed(&inputs).await?.remove(0);
        let sparse = self.sparse.embed(&inputs).await?.remove(0);

        let points = self
            .qdrant
            .query_fused(name, dense, sparse, prefetch_limit, fused_limit)
            .await?;

        Ok(points
            .into_iter()
            .filter_map(|point| point.payload.map(|p| p.text))
            .collect())
    }

    /// All points with vectors and payloads. Empty collections return an
    /// empty list without erroring.
    pub async fn list_points(&self, name: &str) -> VectorResult<Vec<PointRecord>> {
        let count = self.qdrant.count(name).await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.qdrant.scroll(name, None, count, true).await
    }

    /// Fetch a single point by id, for the chunk browse/edit surface.
    pub async fn get_point(&self, name: &str, id: &StoredPointId) -> VectorResult<PointRecord> {
        let mut points = self
            .qdrant
            .retrieve(name, std::slice::from_ref(id))
            .await?;
        points
            .pop()
            .ok_or_else(|| VectorError::PointNotFound(id.to_string()))
    }

    /// Re-embed `new_text` and overwrite the point's payload and vectors in
    /// place, preserving its identity. Returns whether the update succeeded.
    pub async fn update_point(
        &self,
        name: &str,
        id: &StoredPointId,
        new_text: &str,
        source: &str,
    ) -> bool {
        let result = self.try_update_point(name, id, new_text, source).await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to update point {id} in {name}: {e}");
                false
            }
        }
    }

    async fn try_update_point(
        &self,
        name: &str,
        id: &StoredPointId,
        new_text: &str,
        source: &str,
    ) -> VectorResult<()> {
        let inputs = vec![new_text.to_string()];
        let dense = self.dense.embed(&inputs).await?.remove(0);
        let sparse = self.sparse.embed(&inputs).await?.remove(0);

        let payload = PointPayload {
            source: source.to_string(),
            text: new_text.to_string(),
        };
        self.qdrant
            .overwrite_payload(name, std::slice::from_ref(id), &payload)
            .await?;
        self.qdrant.update_vectors(name, id, dense, sparse).await?;
        Ok(())
    }

    /// Delete points by id. No-op on an empty list.
    pub async fn remove_points(&self, name: &str, ids: &[StoredPointId]) -> VectorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.qdrant.delete_points(name, ids).await?;
        info!("Removed {} points from {name}", ids.len());
        Ok(())
    }

    /// Drop the whole collection.
    pub async fn delete_collection(&self, name: &str) -> VectorResult<()> {
        self.qdrant.delete_collection(name).await?;
        info!("Deleted collection {name}");
        Ok(())
    }

    /// Points whose source matches `source` under up to two rounds of
    /// percent-decoding.
    pub async fn points_for_source(
        &self,
        name: &str,
        source: &str,
    ) -> VectorResult<Vec<PointRecord>> {
        let candidates = decode_source_candidates(source);
        let filter = json!({
            "must": [{ "key": "source", "match": { "any": candidates } }]
        });

        let count = self.qdrant.count(name).await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        self.qdrant.scroll(name, Some(filter), count, false).await
    }

    /// Delete every point belonging to a source. Returns how many were
    /// removed.
    pub async fn delete_source(&self, name: &str, source: &str) -> VectorResult<usize> {
        let points = self.points_for_source(name, source).await?;
        let ids: Vec<StoredPointId> = points.into_iter().map(|p| p.id).collect();
        let removed = ids.len();
        self.remove_points(name, &ids).await?;
        Ok(removed)
    }

    /// Find points carrying the `0` sentinel id, re-embed their payload text,
    /// insert replacements under fresh ids, and delete the defective
    /// originals. Never raises; failures accumulate in the report.
    pub async fn repair_invalid_ids(&self, name: &str) -> RepairReport {
        let mut report = RepairReport::default();

        let points = match self.list_points(name).await {
            Ok(points) => points,
            Err(e) => {
                report.errors.push(format!("Failed to list points: {e}"));
                return report;
            }
        };

        let invalid: Vec<&PointRecord> =
            points.iter().filter(|p| p.id.is_zero_sentinel()).collect();
        if invalid.is_empty() {
            return report;
        }

        info!(
            "Found {} points with the invalid 0 id in {name}",
            invalid.len()
        );

        for point in invalid {
            let payload = match &point.payload {
                Some(payload) => payload.clone(),
                None => {
                    report
                        .errors
                        .push("Point with id 0 has no payload to rebuild from".to_string());
                    continue;
                }
            };

            match self.insert_replacement(name, &payload).await {
                Ok(()) => report.fixed_count += 1,
                Err(e) => report.errors.push(format!("Failed to fix point: {e}")),
            }
        }

        if report.fixed_count > 0 {
            let sentinels = [
                StoredPointId::Int(0),
                StoredPointId::Str("0".to_string()),
            ];
            if let Err(e) = self.qdrant.delete_points(name, &sentinels).await {
                report
                    .errors
                    .push(format!("Failed to delete invalid points: {e}"));
            }
        }

        report
    }

    async fn insert_replacement(&self, name: &str, payload: &PointPayload) -> VectorResult<()> {
        let inputs = vec![payload.text.clone()];
        let dense = self.dense.embed(&inputs).await?.remove(0);
        let sparse = self.sparse.embed(&inputs).await?.remove(0);

        let point = PointStruct::new(dense, sparse, payload.clone());
        debug!("Replacing invalid point with fresh id {}", point.id);
        self.qdrant.upsert(name, std::slice::from_ref(&point)).await
    }
}

/// A source label plus up to two rounds of percent-decoding, deduplicated.
///
/// Filenames and URLs arrive singly- or doubly-encoded depending on which
/// upstream surface produced them, so source matching compares against the
/// whole set.
pub fn decode_source_candidates(source: &str) -> Vec<String> {
    let mut candidates = vec![source.to_string()];
    let mut current = source.to_string();

    for _ in 0..2 {
        let decoded = match percent_decode_str(&current).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => break,
        };
        if decoded == current {
            break;
        }
        candidates.push(decoded.clone());
        current = decoded;
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn store_for(server: &MockServer) -> VectorStore {
        let qdrant = QdrantClient::new(server.base_url(), None).unwrap();
        let dense = DenseClient::new(server.url("/dense"), 5).unwrap();
        let sparse = SparseClient::new(server.url("/sparse"), 5).unwrap();
        VectorStore::new(qdrant, dense, sparse, 4)
    }

    fn sparse_body(n: usize) -> serde_json::Value {
        json!({ "vectors": (0..n).map(|i| json!({"indices": [i], "values": [0.5]})).collect::<Vec<_>>() })
    }

    fn dense_body(n: usize) -> serde_json::Value {
        json!({ "vectors": vec![vec![0.1_f32, 0.2, 0.3, 0.4]; n] })
    }

    #[test]
    fn test_decode_source_candidates() {
        let candidates = decode_source_candidates("report%2520final.pdf");
        assert_eq!(
            candidates,
            vec!["report%2520final.pdf", "report%20final.pdf", "report final.pdf"]
        );

        // Already-plain labels produce a single candidate
        assert_eq!(decode_source_candidates("plain.txt"), vec!["plain.txt"]);
    }

    #[tokio::test]
    async fn test_create_collection_is_idempotent() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs/exists");
                then.status(200).json_body(json!({"result": {"exists": true}}));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(200).json_body(json!({"result": true}));
            })
            .await;

        store_for(&server).create_collection("docs").await.unwrap();

        exists.assert_async().await;
        assert_eq!(create.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_create_collection_when_missing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs/exists");
                then.status(200).json_body(json!({"result": {"exists": false}}));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs")
                    .body_includes(r#""distance":"Cosine""#);
                then.status(200).json_body(json!({"result": true}));
            })
            .await;

        store_for(&server).create_collection("docs").await.unwrap();
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_batches_and_reports_progress() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dense/embed");
                then.status(200).json_body(dense_body(2));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sparse/embed");
                then.status(200).json_body(sparse_body(2));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .body_includes(r#""Source: https://x.test/a"#);
                then.status(200).json_body(json!({"result": {"status": "acknowledged"}}));
            })
            .await;

        let (tx, mut rx) = magpie_core::progress_channel();
        let chunks: Vec<String> = (0..4)
            .map(|i| format!("chunk number {i} with some body"))
            .collect();
        let sources = vec![("https://x.test/a".to_string(), chunks)];

        store_for(&server)
            .upsert_points("docs", &sources, 2, Some(&tx))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(upsert.hits_async().await, 2);

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].processed, 2);
        assert_eq!(updates[1].processed, 4);
        assert_eq!(updates[1].total, 4);
        assert!(updates[0].progress <= updates[1].progress);
    }

    #[tokio::test]
    async fn test_query_hybrid_prefetches_both_modalities() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dense/embed");
                then.status(200).json_body(dense_body(1));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sparse/embed");
                then.status(200).json_body(sparse_body(1));
            })
            .await;
        let query = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/query")
                    .body_includes(r#""using":"sparse""#)
                    .body_includes(r#""using":"dense""#)
                    .body_includes(r#""fusion":"rrf""#);
                then.status(200).json_body(json!({"result": {"points": [
                    {"id": "a", "score": 0.9, "payload": {"source": "s1", "text": "first"}},
                    {"id": "b", "score": 0.5, "payload": {"source": "s2", "text": "second"}}
                ]}}));
            })
            .await;

        let texts = store_for(&server)
            .query_hybrid("docs", "what is magpie?", 10, 20)
            .await
            .unwrap();

        query.assert_async().await;
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_list_points_empty_collection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/count");
                then.status(200).json_body(json!({"result": {"count": 0}}));
            })
            .await;

        let points = store_for(&server).list_points("docs").await.unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_update_point_reports_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dense/embed");
                then.status(200).json_body(dense_body(1));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sparse/embed");
                then.status(200).json_body(sparse_body(1));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points/payload");
                then.status(404).body("Not found: point");
            })
            .await;

        let ok = store_for(&server)
            .update_point(
                "docs",
                &StoredPointId::Str("missing".to_string()),
                "new text",
                "file.txt",
            )
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_get_point_missing_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points");
                then.status(200).json_body(json!({"result": []}));
            })
            .await;

        let err = store_for(&server)
            .get_point("docs", &StoredPointId::Str("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::PointNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_points_empty_is_noop() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/delete");
                then.status(200).json_body(json!({"result": {"status": "acknowledged"}}));
            })
            .await;

        store_for(&server).remove_points("docs", &[]).await.unwrap();
        assert_eq!(delete.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_repair_replaces_zero_id_point() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/count");
                then.status(200).json_body(json!({"result": {"count": 2}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/scroll");
                then.status(200).json_body(json!({"result": {"points": [
                    {"id": 0, "payload": {"source": "doc.txt", "text": "orphaned text"}},
                    {"id": "6a1f", "payload": {"source": "doc.txt", "text": "healthy"}}
                ]}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dense/embed");
                then.status(200).json_body(dense_body(1));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sparse/embed");
                then.status(200).json_body(sparse_body(1));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .body_includes(r#""text":"orphaned text""#);
                then.status(200).json_body(json!({"result": {"status": "acknowledged"}}));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/delete")
                    .body_includes(r#"[0,"0"]"#);
                then.status(200).json_body(json!({"result": {"status": "acknowledged"}}));
            })
            .await;

        let report = store_for(&server).repair_invalid_ids("docs").await;

        assert_eq!(report.fixed_count, 1);
        assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
        upsert.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_repair_clean_collection_is_noop() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/count");
                then.status(200).json_body(json!({"result": {"count": 1}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/scroll");
                then.status(200).json_body(json!({"result": {"points": [
                    {"id": "6a1f", "payload": {"source": "doc.txt", "text": "healthy"}}
                ]}}));
            })
            .await;

        let report = store_for(&server).repair_invalid_ids("docs").await;
        assert_eq!(report.fixed_count, 0);
        assert!(report.errors.is_empty());
    }
}

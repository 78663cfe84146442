//! HTTP control surface: job control plus document and URL ingestion.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use magpie_core::{CrawlJob, DocumentFormat};
use magpie_jobs::{IngestOutcome, JobError, Orchestrator};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Upload ceiling for document ingestion.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/jobs/crawl_url", post(create_crawl_job))
        .route("/jobs/by-id/:job_id", get(get_job))
        .route("/jobs/active", get(get_active_job))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/documents", post(insert_document))
        .route("/urls", post(insert_urls))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn job_error_response(error: JobError) -> ApiError {
    match &error {
        JobError::NotFound(_) => error_response(StatusCode::NOT_FOUND, error.to_string()),
        JobError::NotCancellable(_) => error_response(StatusCode::CONFLICT, error.to_string()),
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct CrawlJobRequest {
    base_url: Option<String>,
    collection_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CrawlJobResponse {
    job_id: String,
    already_running: bool,
}

async fn create_crawl_job(
    State(state): State<AppState>,
    Json(request): Json<CrawlJobRequest>,
) -> Result<(StatusCode, Json<CrawlJobResponse>), ApiError> {
    let base_url = request.base_url.unwrap_or_default();
    let collection = request.collection_name.unwrap_or_default();
    if base_url.is_empty() || collection.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "base_url and collection_name are required",
        ));
    }

    let outcome = state.orchestrator.submit_crawl(&base_url, &collection).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(CrawlJobResponse {
            job_id: outcome.job_id,
            already_running: outcome.already_running,
        }),
    ))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CrawlJob>, ApiError> {
    state
        .orchestrator
        .get_job(&job_id)
        .await
        .map(Json)
        .map_err(job_error_response)
}

#[derive(Debug, Deserialize)]
struct ActiveJobQuery {
    collection_name: String,
}

async fn get_active_job(
    State(state): State<AppState>,
    Query(query): Query<ActiveJobQuery>,
) -> Result<Json<CrawlJob>, ApiError> {
    match state.orchestrator.active_job(&query.collection_name).await {
        Some(job) => Ok(Json(job)),
        None => Err(error_response(StatusCode::NOT_FOUND, "no active job")),
    }
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    info!("Cancelling job {job_id}");
    state
        .orchestrator
        .cancel(&job_id)
        .await
        .map(|()| (StatusCode::ACCEPTED, Json(json!({"ok": true}))))
        .map_err(job_error_response)
}

async fn insert_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestOutcome>, ApiError> {
    let mut collection: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        match field.name() {
            Some("collection_name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                collection = Some(text);
            }
            Some("file") => {
                filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                bytes = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let (Some(collection), Some(filename), Some(bytes)) = (collection, filename, bytes) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "collection_name and file are required",
        ));
    };

    let extension = std::path::Path::new(&filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let format = match DocumentFormat::from_extension(extension) {
        Some(format) if format != DocumentFormat::Markdown => format,
        _ => {
            let error = magpie_chunk::ChunkError::UnsupportedFormat(extension.to_string());
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("{error}. Only the following file types are allowed: .txt, .csv, .pdf"),
            ));
        }
    };

    let outcome = state
        .orchestrator
        .ingest_document(&collection, &bytes, format, &filename)
        .await;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct InsertUrlsRequest {
    collection_name: String,
    urls: Vec<String>,
}

async fn insert_urls(
    State(state): State<AppState>,
    Json(request): Json<InsertUrlsRequest>,
) -> Json<IngestOutcome> {
    Json(
        state
            .orchestrator
            .ingest_urls(&request.collection_name, request.urls)
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use httpmock::prelude::*;
    use magpie_chunk::ChunkingEngine;
    use magpie_crawl::Crawler;
    use magpie_embed::{DenseClient, SparseClient};
    use magpie_jobs::{IngestContext, RenderManager};
    use magpie_vector::{QdrantClient, VectorStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn test_state(server: &MockServer) -> AppState {
        let qdrant = QdrantClient::new(server.base_url(), None).unwrap();
        let dense = DenseClient::new(server.url("/dense"), 5).unwrap();
        let sparse = SparseClient::new(server.url("/sparse"), 5).unwrap();
        let store = VectorStore::new(qdrant, dense.clone(), sparse, 4);
        let engine = Arc::new(ChunkingEngine::new(Arc::new(dense), 512));
        let crawler = Arc::new(
            Crawler::from_config(&magpie_config::CrawlConfig::default()).unwrap(),
        );
        let renderer = Arc::new(RenderManager::new(magpie_config::RenderConfig {
            url: server.url("/render"),
            timeout_seconds: 5,
            concurrency: 2,
        }));

        AppState {
            orchestrator: Orchestrator::new(IngestContext {
                store,
                engine,
                crawler,
                renderer,
                batch_size: 64,
            }),
        }
    }

    async fn mock_ingest_backends(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/render/sessions");
                then.status(200).json_body(serde_json::json!({"session_id": "s-1"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/render/sessions/s-1/render");
                then.status(200).json_body(serde_json::json!({
                    "markdown": "## Page\n\nRendered prose long enough to clear the minimum chunk length filter."
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dense/tokenize");
                then.status(200).json_body(serde_json::json!({"counts": [10]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dense/embed");
                then.status(200)
                    .json_body(serde_json::json!({"vectors": [[0.1, 0.2, 0.3, 0.4]]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/sparse/embed");
                then.status(200)
                    .json_body(serde_json::json!({"vectors": [{"indices": [2], "values": [0.6]}]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs/exists");
                then.status(200)
                    .json_body(serde_json::json!({"result": {"exists": true}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(200)
                    .json_body(serde_json::json!({"result": {"status": "acknowledged"}}));
            })
            .await;
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_job_requires_fields() {
        let server = MockServer::start_async().await;
        let app = router(test_state(&server));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/crawl_url")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"base_url": "https://x.test/docs/"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let server = MockServer::start_async().await;
        let app = router(test_state(&server));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/jobs/by-id/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_no_active_job_is_404() {
        let server = MockServer::start_async().await;
        let app = router(test_state(&server));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/jobs/active?collection_name=docs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_404() {
        let server = MockServer::start_async().await;
        let app = router(test_state(&server));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/nope/cancel")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_crawl_job_lifecycle_over_http() {
        let server = MockServer::start_async().await;
        mock_ingest_backends(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<p>single page</p>");
            })
            .await;

        let state = test_state(&server);
        let app = router(state.clone());
        let base = format!("{}/docs/", server.base_url());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/crawl_url")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"base_url": base, "collection_name": "docs"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let created = body_json(response).await;
        assert_eq!(created["already_running"], false);
        let job_id = created["job_id"].as_str().unwrap().to_string();

        // Poll the status endpoint until the job lands in a terminal state
        let mut last_status = String::new();
        for _ in 0..250 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/jobs/by-id/{job_id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let job = body_json(response).await;
            last_status = job["status"].as_str().unwrap_or_default().to_string();
            if ["succeeded", "failed", "cancelled"].contains(&last_status.as_str()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(last_status, "succeeded");

        // Terminal jobs reject cancellation with a conflict
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/jobs/{job_id}/cancel"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_insert_urls_over_http() {
        let server = MockServer::start_async().await;
        mock_ingest_backends(&server).await;

        let app = router(test_state(&server));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/urls")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "collection_name": "docs",
                            "urls": ["https://x.test/docs/"]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["success"], true);
    }

    fn multipart_body(boundary: &str, collection: &str, filename: &str, content: &str) -> String {
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"collection_name\"\r\n\r\n\
             {collection}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        )
    }

    #[tokio::test]
    async fn test_insert_document_txt() {
        let server = MockServer::start_async().await;
        mock_ingest_backends(&server).await;

        let app = router(test_state(&server));
        let boundary = "magpie-test-boundary";
        let content = "An uploaded note with more than fifty characters of content in it.";
        let body = multipart_body(boundary, "docs", "note.txt", content);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["success"], true);
    }

    #[tokio::test]
    async fn test_insert_document_rejects_unknown_format() {
        let server = MockServer::start_async().await;
        let app = router(test_state(&server));
        let boundary = "magpie-test-boundary";
        let body = multipart_body(boundary, "docs", "slides.docx", "irrelevant");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

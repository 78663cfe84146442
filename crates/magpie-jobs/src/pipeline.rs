//! The crawl → chunk → upsert pipeline and the direct ingestion entry points.

use crate::render_manager::RenderManager;
use futures_util::StreamExt;
use magpie_chunk::ChunkingEngine;
use magpie_core::{emit, ProgressSender, ProgressUpdate};
use magpie_crawl::{Crawler, CrawlResult, RendererClient};
use magpie_vector::VectorStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Everything the pipeline needs to run one ingestion.
#[derive(Clone)]
pub struct IngestContext {
    pub store: VectorStore,
    pub engine: Arc<ChunkingEngine>,
    pub crawler: Arc<Crawler>,
    pub renderer: Arc<RenderManager>,
    pub batch_size: usize,
}

/// Outcome of a direct ingestion call: a boolean plus a structured error
/// list, never an exception.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub success: bool,
    pub errors: Vec<String>,
}

impl IngestOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
        }
    }
}

/// Drop fragment-stripped duplicates while preserving order.
pub(crate) fn dedupe_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for url in urls {
        let stripped = url.split('#').next().unwrap_or_default().to_string();
        if !stripped.is_empty() && seen.insert(stripped.clone()) {
            out.push(stripped);
        }
    }
    out
}

/// Whole-site crawl: discover, render, chunk, upsert.
///
/// Returns the pipeline's boolean outcome; only a closed render session
/// escapes as an error so the orchestrator can restart and retry.
pub(crate) async fn run_crawl(
    ctx: &IngestContext,
    renderer: &RendererClient,
    base_url: &str,
    collection: &str,
    progress: Option<&ProgressSender>,
) -> CrawlResult<bool> {
    let urls = match ctx.crawler.discover(base_url, progress).await {
        Ok(urls) => urls,
        Err(e) => {
            error!("Error crawling {base_url}: {e}");
            return Ok(false);
        }
    };

    if let Some(sender) = progress {
        let total = urls.len().max(1) as u64;
        emit(
            sender,
            ProgressUpdate::new(0, total, format!("Crawling finished. ({total} links)")),
        );
    }

    render_into_collection(ctx, renderer, urls, collection, progress).await
}

/// Render a URL list, chunk the markdown, and store the chunks.
pub(crate) async fn render_into_collection(
    ctx: &IngestContext,
    renderer: &RendererClient,
    urls: Vec<String>,
    collection: &str,
    progress: Option<&ProgressSender>,
) -> CrawlResult<bool> {
    let urls = dedupe_urls(urls);

    let mut sources_to_chunks: Vec<(String, Vec<String>)> = Vec::new();
    let mut pages = renderer.render_stream(urls);

    while let Some(result) = pages.next().await {
        match result {
            Ok(page) => match ctx.engine.chunk_markdown(&page.markdown).await {
                Ok(chunks) if !chunks.is_empty() => {
                    debug!("Chunked {} into {} chunks", page.url, chunks.len());
                    sources_to_chunks.push((page.url, chunks));
                }
                Ok(_) => debug!("No usable content on {}", page.url),
                Err(e) => warn!("Failed to chunk {}: {e}", page.url),
            },
            // A dead session must reach the orchestrator's restart policy
            Err(e) if e.is_render_closed() => return Err(e),
            Err(e) => warn!("Failed to render page: {e}"),
        }
    }

    if let Err(e) = ctx.store.create_collection(collection).await {
        error!("Error preparing collection {collection}: {e}");
        return Ok(false);
    }

    match ctx
        .store
        .upsert_points(collection, &sources_to_chunks, ctx.batch_size, progress)
        .await
    {
        Ok(()) => Ok(true),
        Err(e) => {
            error!("Error storing chunks in {collection}: {e}");
            Ok(false)
        }
    }
}

/// Ingest an explicit URL list synchronously, outside any job record.
pub(crate) async fn ingest_urls(
    ctx: &IngestContext,
    collection: &str,
    urls: Vec<String>,
) -> IngestOutcome {
    let result = ctx
        .renderer
        .with_retry(|client| {
            let ctx = ctx.clone();
            let urls = urls.clone();
            let collection = collection.to_string();
            async move { render_into_collection(&ctx, &client, urls, &collection, None).await }
        })
        .await;

    // Refresh the session so stale browser state never leaks between calls
    ctx.renderer.recycle().await;

    match result {
        Ok(true) => IngestOutcome::ok(),
        Ok(false) => IngestOutcome::failure("Failed to ingest URLs"),
        Err(e) => IngestOutcome::failure(format!("Failed to ingest URLs: {e}")),
    }
}

/// Ingest one uploaded document through the chunking engine.
pub(crate) async fn ingest_document(
    ctx: &IngestContext,
    collection: &str,
    bytes: &[u8],
    format: magpie_core::DocumentFormat,
    source: &str,
) -> IngestOutcome {
    let chunks = match ctx.engine.chunk_document(bytes, format).await {
        Ok(chunks) => chunks,
        Err(e) => return IngestOutcome::failure(format!("Failed to chunk {source}: {e}")),
    };

    if let Err(e) = ctx.store.create_collection(collection).await {
        return IngestOutcome::failure(format!("Failed to prepare collection: {e}"));
    }

    let sources = vec![(source.to_string(), chunks)];
    match ctx
        .store
        .upsert_points(collection, &sources, ctx.batch_size, None)
        .await
    {
        Ok(()) => IngestOutcome::ok(),
        Err(e) => IngestOutcome::failure(format!("Failed to store chunks: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_strips_fragments() {
        let urls = vec![
            "https://x.test/docs/".to_string(),
            "https://x.test/docs/#install".to_string(),
            "https://x.test/docs/page".to_string(),
            "https://x.test/docs/page".to_string(),
        ];
        assert_eq!(
            dedupe_urls(urls),
            vec![
                "https://x.test/docs/".to_string(),
                "https://x.test/docs/page".to_string(),
            ]
        );
    }
}

//! The shared render session and its restart policy.

use magpie_config::RenderConfig;
use magpie_crawl::{CrawlError, CrawlResult, RendererClient};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Owner of the single shared render session.
///
/// All creation and restart goes through one mutex so concurrent failures
/// cannot race each other into a restart storm.
pub struct RenderManager {
    config: RenderConfig,
    session: Mutex<Option<RendererClient>>,
}

impl RenderManager {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// The shared renderer, created lazily on first use.
    pub async fn acquire(&self) -> CrawlResult<RendererClient> {
        let mut guard = self.session.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = RendererClient::connect(&self.config).await?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Close the current session and open a fresh one.
    pub async fn restart(&self) -> CrawlResult<RendererClient> {
        let mut guard = self.session.lock().await;
        if let Some(old) = guard.take() {
            old.close().await;
        }
        let client = RendererClient::connect(&self.config).await?;
        info!("Render session restarted as {}", client.session_id());
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Restart after a finished job so the next one starts clean.
    /// Best-effort: a failure here is logged, never raised.
    pub async fn recycle(&self) {
        if let Err(e) = self.restart().await {
            warn!("Failed to restart renderer after job completion: {e}");
        }
    }

    /// Run an operation against the shared renderer with exactly one
    /// restart-and-retry when the session turns out to be closed. A second
    /// closed-session failure propagates to the caller.
    pub async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, CrawlError>
    where
        F: FnMut(RendererClient) -> Fut,
        Fut: Future<Output = Result<T, CrawlError>>,
    {
        let client = self.acquire().await?;
        match op(client).await {
            Err(e) if e.is_render_closed() => {
                warn!("Render session closed unexpectedly. Restarting (attempt 1/1)...");
                let client = self.restart().await?;
                op(client).await
            }
            other => other,
        }
    }
}

//! Session client for the headless render service.

use crate::error::{is_closed_session_message, CrawlError, CrawlResult};
use futures_util::stream::{self, Stream, StreamExt};
use magpie_config::RenderConfig;
use magpie_core::DiscoveredPage;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    markdown: String,
}

/// One live session against the render service.
///
/// The service holds a browser per session; when that browser dies the
/// session answers with a conflict or a closed-session message, which maps
/// to [`CrawlError::RenderClosed`] for the orchestrator's restart policy.
#[derive(Clone)]
pub struct RendererClient {
    client: Client,
    base_url: String,
    session_id: String,
    concurrency: usize,
}

impl RendererClient {
    /// Open a fresh render session.
    pub async fn connect(config: &RenderConfig) -> CrawlResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(CrawlError::Http)?;
        let base_url = config.url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{base_url}/sessions"))
            .send()
            .await
            .map_err(CrawlError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CrawlError::RenderApi {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response.json().await.map_err(CrawlError::Http)?;
        debug!("Opened render session {}", session.session_id);

        Ok(Self {
            client,
            base_url,
            session_id: session.session_id,
            concurrency: config.concurrency.max(1),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Close the session. Best-effort: a failure is logged, never raised.
    pub async fn close(&self) {
        let url = format!("{}/sessions/{}", self.base_url, self.session_id);
        if let Err(e) = self.client.delete(url).send().await {
            warn!("Failed to close render session {}: {e}", self.session_id);
        }
    }

    /// Render one page to markdown.
    pub async fn render(&self, url: &str) -> CrawlResult<DiscoveredPage> {
        let endpoint = format!("{}/sessions/{}/render", self.base_url, self.session_id);
        let response = self
            .client
            .post(endpoint)
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(CrawlError::Http)?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT || status == reqwest::StatusCode::GONE {
            return Err(CrawlError::RenderClosed(format!(
                "render session {} rejected with status {status}",
                self.session_id
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if is_closed_session_message(&message) {
                return Err(CrawlError::RenderClosed(message));
            }
            return Err(CrawlError::RenderApi {
                status: status.as_u16(),
                message,
            });
        }

        let rendered: RenderResponse = response.json().await.map_err(CrawlError::Http)?;
        Ok(DiscoveredPage {
            url: url.to_string(),
            markdown: rendered.markdown,
        })
    }

    /// Render many pages concurrently, streaming results as they complete.
    pub fn render_stream(
        &self,
        urls: Vec<String>,
    ) -> impl Stream<Item = CrawlResult<DiscoveredPage>> + Send {
        let this = self.clone();
        let concurrency = self.concurrency;
        stream::iter(urls)
            .map(move |url| {
                let client = this.clone();
                async move { client.render(&url).await }
            })
            .buffer_unordered(concurrency)
    }
}

//! Breadth-first same-origin link discovery.

use crate::error::{CrawlError, CrawlResult};
use magpie_config::CrawlConfig;
use magpie_core::{emit, ProgressSender, ProgressUpdate};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Normalize a crawl seed: force a scheme, ensure a trailing slash on the
/// path, and strip any fragment.
pub fn normalize_base_url(base_url: &str) -> CrawlResult<Url> {
    let trimmed = base_url.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)?;
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Link-discovery crawler bounded by the base URL's host and path prefix.
pub struct Crawler {
    client: Client,
}

impl Crawler {
    pub fn from_config(config: &CrawlConfig) -> CrawlResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .pool_max_idle_per_host(config.max_connections)
            .build()
            .map_err(CrawlError::Http)?;
        Ok(Self { client })
    }

    /// Breadth-first traversal from `base_url`, returning the visited URLs in
    /// visit order.
    ///
    /// Single-page fetch failures are skipped. The traversal yields back to
    /// the scheduler after each page so a long crawl never monopolizes the
    /// runtime.
    pub async fn discover(
        &self,
        base_url: &str,
        progress: Option<&ProgressSender>,
    ) -> CrawlResult<Vec<String>> {
        let base = normalize_base_url(base_url)?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::from([base.to_string()]);

        while let Some(current) = queue.pop_front() {
            // Keep the runtime responsive between pages
            tokio::task::yield_now().await;

            if !visited.insert(current.clone()) {
                continue;
            }
            order.push(current.clone());

            if let Some(body) = self.fetch_html(&current).await {
                if let Ok(current_url) = Url::parse(&current) {
                    for link in extract_links(&body, &current_url, &base) {
                        if !visited.contains(&link) && !queue.contains(&link) {
                            queue.push_back(link);
                        }
                    }
                }
            }

            if let Some(sender) = progress {
                let processed = visited.len() as u64;
                let total = processed + queue.len() as u64;
                emit(
                    sender,
                    ProgressUpdate::new(
                        processed,
                        total,
                        format!("Crawling pages ({processed} discovered)"),
                    )
                    .with_last_url(current.clone()),
                );
            }
        }

        Ok(order)
    }

    /// Fetch one page, returning its body only for successful HTML responses.
    async fn fetch_html(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Skipping {url}: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("Skipping {url}: status {}", response.status());
            return None;
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            return None;
        }

        response.text().await.ok()
    }
}

/// Extract same-origin, path-scoped links from a page.
///
/// Fragments are stripped; `javascript:` and `mailto:` targets are skipped;
/// only URLs on the base host whose resolved form starts with the base
/// prefix survive.
fn extract_links(html: &str, current: &Url, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector");

    let base_prefix = base.as_str();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }

        let Ok(mut resolved) = current.join(href) else {
            continue;
        };
        resolved.set_fragment(None);

        if resolved.host_str() != base.host_str() {
            continue;
        }
        if !resolved.as_str().starts_with(base_prefix) {
            continue;
        }

        links.push(resolved.to_string());
    }

    links
}

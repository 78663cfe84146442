//! Error types for crawling and rendering.

use thiserror::Error;

/// Result type for crawl operations.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Errors that can occur while discovering or rendering pages.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The shared render session is gone. This is the signal for the job
    /// orchestrator's restart-and-retry policy; it must never be swallowed
    /// inside the crawler.
    #[error("Render session closed: {0}")]
    RenderClosed(String),

    #[error("Render service error (status {status}): {message}")]
    RenderApi { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CrawlError {
    /// Whether this failure means the render session must be recreated.
    pub fn is_render_closed(&self) -> bool {
        matches!(self, CrawlError::RenderClosed(_))
    }
}

/// Message fragments the render service uses when its underlying browser
/// session has gone away.
pub(crate) fn is_closed_session_message(message: &str) -> bool {
    const SIGNALS: [&str; 3] = [
        "session closed",
        "browser has been closed",
        "connection closed",
    ];
    let lower = message.to_lowercase();
    SIGNALS.iter().any(|signal| lower.contains(signal))
}

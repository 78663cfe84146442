//! Typed progress events flowing from pipeline stages to job records.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A point-in-time progress report from the crawler or the upsert loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub processed: u64,
    /// Evolving estimate while crawling, exact during upsert.
    pub total: u64,
    /// `processed / max(total, 1)` as a fraction in `[0, 1]`.
    pub progress: f64,
    pub message: String,
    pub last_url: Option<String>,
}

impl ProgressUpdate {
    pub fn new(processed: u64, total: u64, message: impl Into<String>) -> Self {
        let denom = total.max(1);
        Self {
            processed,
            total: denom,
            progress: processed as f64 / denom as f64,
            message: message.into(),
            last_url: None,
        }
    }

    pub fn with_last_url(mut self, url: impl Into<String>) -> Self {
        self.last_url = Some(url.into());
        self
    }
}

/// Sending half of a progress channel. Producers never block on consumers.
pub type ProgressSender = mpsc::UnboundedSender<ProgressUpdate>;

/// Receiving half of a progress channel.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressUpdate>;

/// Create a progress channel pair.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Emit an update, ignoring a closed receiver.
///
/// A consumer that has gone away must not fail the producing pipeline.
pub fn emit(sender: &ProgressSender, update: ProgressUpdate) {
    let _ = sender.send(update);
}

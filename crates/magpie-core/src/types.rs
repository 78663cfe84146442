//! Core domain types for Magpie.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for crawl jobs.
pub type JobId = String;

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Identifier for a stored vector point.
///
/// The only way to obtain one is [`PointId::generate`], which always produces
/// a fresh UUID. There is no `Default` and no numeric form, so a point can
/// never silently fall back to the `0` sentinel that plagued collections
/// written by earlier versions of this pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PointId(String);

impl PointId {
    /// Generate a fresh, unique point identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported input formats for document chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Txt,
    Csv,
    Markdown,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Markdown => "markdown",
        }
    }

    /// Detect format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" => Some(DocumentFormat::Txt),
            "csv" => Some(DocumentFormat::Csv),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bounded text segment sized to fit the embedding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// URL or filename the chunk came from.
    pub source: String,
    /// Chunk text payload.
    pub text: String,
    /// Ordinal position within the source.
    pub position: usize,
}

impl Chunk {
    pub fn new(source: impl Into<String>, position: usize, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            position,
        }
    }
}

/// A rendered page produced by the crawler, consumed by the chunking engine.
#[derive(Debug, Clone)]
pub struct DiscoveredPage {
    /// Normalized absolute URL with the fragment stripped.
    pub url: String,
    /// Rendered markdown content.
    pub markdown: String,
}

/// Variable-length index/value pairs for lexical-style matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// Lifecycle status of a crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the job still occupies its collection slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    /// Whether the job has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether a cancellation request is accepted in this state.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Running | JobStatus::Cancelling
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind tag carried on job records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    UrlCrawl,
}

/// A background crawl job record.
///
/// Owned by the orchestrator; external callers only ever see cloned
/// snapshots, never a live handle.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlJob {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub base_url: String,
    pub collection: String,
    pub processed: u64,
    pub total: u64,
    pub progress: f64,
    pub message: String,
    pub last_url: Option<String>,
    /// Pipeline outcome once the job is terminal.
    pub result: Option<bool>,
    pub error: Option<String>,
}

impl CrawlJob {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            kind: JobKind::UrlCrawl,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            base_url: base_url.into(),
            collection: collection.into(),
            processed: 0,
            total: 0,
            progress: 0.0,
            message: String::new(),
            last_url: None,
            result: None,
            error: None,
        }
    }

    /// Fold a progress event into the job's counters.
    pub fn apply_progress(&mut self, update: &crate::ProgressUpdate) {
        self.processed = update.processed;
        self.total = update.total;
        self.progress = update.progress;
        self.message = update.message.clone();
        if let Some(url) = &update.last_url {
            self.last_url = Some(url.clone());
        }
    }
}

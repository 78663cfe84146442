//! Error types for job control.

use thiserror::Error;

/// Errors surfaced by the job control operations.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The job is already in a terminal state.
    #[error("Job {0} is not cancellable")]
    NotCancellable(String),
}

/// Result type for job control operations.
pub type JobResult<T> = Result<T, JobError>;

//! The job orchestrator: submission, execution, cancellation, queries.

use crate::error::{JobError, JobResult};
use crate::pipeline::{self, IngestContext, IngestOutcome};
use crate::registry::JobRegistry;
use chrono::Utc;
use magpie_core::{progress_channel, CrawlJob, DocumentFormat, JobId, JobStatus};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a crawl-job submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job_id: JobId,
    /// True when an existing queued/running job was returned instead of a
    /// new one.
    pub already_running: bool,
}

/// Owns the job registry and drives crawl jobs through their state machine.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<JobRegistry>,
    ctx: IngestContext,
}

impl Orchestrator {
    pub fn new(ctx: IngestContext) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            ctx,
        }
    }

    pub fn context(&self) -> &IngestContext {
        &self.ctx
    }

    /// Submit a crawl job for a collection.
    ///
    /// At most one queued/running job may exist per collection; a duplicate
    /// submission returns the existing job's id instead of creating one.
    pub async fn submit_crawl(&self, base_url: &str, collection: &str) -> SubmitOutcome {
        if let Some(existing_id) = self.registry.active_job_id(collection).await {
            if let Some(existing) = self.registry.get(&existing_id).await {
                if existing.status.is_active() {
                    info!("Collection {collection} already has active job {existing_id}");
                    return SubmitOutcome {
                        job_id: existing_id,
                        already_running: true,
                    };
                }
            }
        }

        let job = CrawlJob::new(base_url, collection);
        let job_id = job.id.clone();
        self.registry.insert(job).await;
        info!("Created crawl job {job_id} for collection {collection}");

        self.spawn_execution(job_id.clone(), base_url.to_string(), collection.to_string());

        SubmitOutcome {
            job_id,
            already_running: false,
        }
    }

    fn spawn_execution(&self, job_id: JobId, base_url: String, collection: String) {
        let registry = self.registry.clone();
        let ctx = self.ctx.clone();

        tokio::spawn(async move {
            registry
                .update(&job_id, |job| {
                    job.status = JobStatus::Running;
                    job.started_at = Some(Utc::now());
                })
                .await;

            let (tx, mut rx) = progress_channel();

            // Progress events flow into the job record while it is running;
            // nothing is applied once cancellation has been observed.
            let consumer = {
                let registry = registry.clone();
                let job_id = job_id.clone();
                tokio::spawn(async move {
                    while let Some(update) = rx.recv().await {
                        registry
                            .update(&job_id, |job| {
                                if job.status == JobStatus::Running {
                                    job.apply_progress(&update);
                                }
                            })
                            .await;
                    }
                })
            };

            // The pipeline runs on its own task so cancellation can abort it
            // at the next await point without touching the supervisor.
            let pipeline_task = {
                let ctx = ctx.clone();
                let base_url = base_url.clone();
                let collection = collection.clone();
                tokio::spawn(async move {
                    let renderer = ctx.renderer.clone();
                    renderer
                        .with_retry(move |client| {
                            let ctx = ctx.clone();
                            let base_url = base_url.clone();
                            let collection = collection.clone();
                            let tx = tx.clone();
                            async move {
                                pipeline::run_crawl(&ctx, &client, &base_url, &collection, Some(&tx))
                                    .await
                            }
                        })
                        .await
                })
            };

            registry
                .set_handle(&job_id, pipeline_task.abort_handle())
                .await;

            let outcome = pipeline_task.await;
            // All progress senders are gone once the pipeline task is done
            let _ = consumer.await;

            let was_aborted = matches!(&outcome, Err(e) if e.is_cancelled());
            registry
                .update(&job_id, |job| {
                    if was_aborted || job.status == JobStatus::Cancelling {
                        job.status = JobStatus::Cancelled;
                        job.result = Some(false);
                        job.message = "Cancelled.".to_string();
                    } else {
                        match &outcome {
                            Ok(Ok(success)) => {
                                job.status = if *success {
                                    JobStatus::Succeeded
                                } else {
                                    JobStatus::Failed
                                };
                                job.result = Some(*success);
                            }
                            Ok(Err(e)) => {
                                job.status = JobStatus::Failed;
                                job.result = Some(false);
                                job.error = Some(e.to_string());
                            }
                            Err(e) => {
                                job.status = JobStatus::Failed;
                                job.error = Some(e.to_string());
                            }
                        }
                    }
                    job.finished_at = Some(Utc::now());
                })
                .await;

            registry.release_collection(&collection, &job_id).await;
            registry.clear_handle(&job_id).await;

            // Hand the next job a clean renderer, whatever happened here
            ctx.renderer.recycle().await;
        });
    }

    /// Snapshot a job by id.
    pub async fn get_job(&self, job_id: &str) -> JobResult<CrawlJob> {
        self.registry
            .get(job_id)
            .await
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// The currently active job for a collection, if any.
    pub async fn active_job(&self, collection: &str) -> Option<CrawlJob> {
        self.registry.active_job(collection).await
    }

    /// Request cooperative cancellation of a job.
    ///
    /// Valid only from `queued`, `running`, or `cancelling`; terminal jobs
    /// are rejected as not cancellable.
    pub async fn cancel(&self, job_id: &str) -> JobResult<()> {
        let job = self
            .registry
            .get(job_id)
            .await
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if !job.status.is_cancellable() {
            warn!("Refusing to cancel job {job_id} in status {}", job.status);
            return Err(JobError::NotCancellable(job_id.to_string()));
        }

        self.registry
            .update(job_id, |job| job.status = JobStatus::Cancelling)
            .await;
        if let Some(handle) = self.registry.abort_handle(job_id).await {
            handle.abort();
        }
        info!("Cancellation requested for job {job_id}");
        Ok(())
    }

    /// Ingest an explicit URL list synchronously; no job record is created.
    pub async fn ingest_urls(&self, collection: &str, urls: Vec<String>) -> IngestOutcome {
        pipeline::ingest_urls(&self.ctx, collection, urls).await
    }

    /// Ingest one uploaded document.
    pub async fn ingest_document(
        &self,
        collection: &str,
        bytes: &[u8],
        format: DocumentFormat,
        source: &str,
    ) -> IngestOutcome {
        pipeline::ingest_document(&self.ctx, collection, bytes, format, source).await
    }
}

//! Shared job registry: id lookup and the active-job-per-collection index.

use magpie_core::{CrawlJob, JobId};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Concurrent registry of job records.
///
/// Mutations are point-in-time field updates under short-lived locks so
/// status queries never wait on a running pipeline.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, CrawlJob>>,
    active: RwLock<HashMap<String, JobId>>,
    handles: Mutex<HashMap<JobId, AbortHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job and claim its collection slot.
    pub async fn insert(&self, job: CrawlJob) {
        let job_id = job.id.clone();
        let collection = job.collection.clone();
        self.jobs.write().await.insert(job_id.clone(), job);
        self.active.write().await.insert(collection, job_id);
    }

    /// Snapshot a job by id.
    pub async fn get(&self, job_id: &str) -> Option<CrawlJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Id of the job currently holding a collection's slot.
    pub async fn active_job_id(&self, collection: &str) -> Option<JobId> {
        self.active.read().await.get(collection).cloned()
    }

    /// Snapshot of the job currently holding a collection's slot.
    pub async fn active_job(&self, collection: &str) -> Option<CrawlJob> {
        let job_id = self.active_job_id(collection).await?;
        self.get(&job_id).await
    }

    /// Apply a point-in-time mutation to a job record.
    pub async fn update<F>(&self, job_id: &str, mutate: F)
    where
        F: FnOnce(&mut CrawlJob),
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(job_id) {
            Some(job) => mutate(job),
            None => warn!("Attempted to update unknown job {job_id}"),
        }
    }

    /// Release a collection's slot, but only if it still belongs to this job.
    pub async fn release_collection(&self, collection: &str, job_id: &str) {
        let mut active = self.active.write().await;
        match active.get(collection) {
            Some(current) if current == job_id => {
                active.remove(collection);
                debug!("Released collection {collection} from job {job_id}");
            }
            Some(other) => {
                warn!(
                    "Collection {collection} is held by job {other}, not {job_id}; leaving it"
                );
            }
            None => {}
        }
    }

    /// Remember the abort handle for a running pipeline task.
    pub async fn set_handle(&self, job_id: &str, handle: AbortHandle) {
        self.handles.lock().await.insert(job_id.to_string(), handle);
    }

    /// The abort handle for a job, if its pipeline is running.
    pub async fn abort_handle(&self, job_id: &str) -> Option<AbortHandle> {
        self.handles.lock().await.get(job_id).cloned()
    }

    /// Forget a finished pipeline's handle.
    pub async fn clear_handle(&self, job_id: &str) {
        self.handles.lock().await.remove(job_id);
    }
}

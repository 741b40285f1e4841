//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use mflow_models::{ErrorInfo, Job, JobId, JobStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::{JobFilter, JobStore};

/// Process-local store over a `RwLock`ed map. Writes serialize through the
/// lock; reads hand out clones so callers can never mutate stored state.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate<F>(&self, id: &JobId, apply: F) -> StoreResult<Job>
    where
        F: FnOnce(Job) -> Job,
    {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let updated = apply(current);
        jobs.insert(id.clone(), updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn update(&self, job: Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(StoreError::NotFound(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn list(&self, filter: JobFilter) -> StoreResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|job| filter.status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn set_status(&self, id: &JobId, status: JobStatus, progress: u8) -> StoreResult<Job> {
        self.mutate(id, |job| job.with_status(status, progress)).await
    }

    async fn set_progress(&self, id: &JobId, progress: u8) -> StoreResult<Job> {
        self.mutate(id, |job| job.with_progress(progress)).await
    }

    async fn fail(&self, id: &JobId, error: ErrorInfo) -> StoreResult<Job> {
        self.mutate(id, |job| job.fail(error)).await
    }
}

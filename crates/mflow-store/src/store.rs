//! The job store contract.

use async_trait::async_trait;

use mflow_models::{ErrorInfo, Job, JobId, JobStatus};

use crate::error::StoreResult;

/// Filter for job listings.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Key-addressable job record store.
///
/// Records are exclusively owned by the store: reads return independent
/// deep copies, and all mutation goes through `update` or the convenience
/// setters. Implementations serialize writes per key.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record; the id must not exist yet.
    async fn create(&self, job: Job) -> StoreResult<()>;

    /// Fetch a deep copy of a record.
    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Replace an existing record.
    async fn update(&self, job: Job) -> StoreResult<()>;

    /// List records, newest first.
    async fn list(&self, filter: JobFilter) -> StoreResult<Vec<Job>>;

    /// Advance a job's status with a progress tick.
    async fn set_status(&self, id: &JobId, status: JobStatus, progress: u8) -> StoreResult<Job>;

    /// Update only the progress figure.
    async fn set_progress(&self, id: &JobId, progress: u8) -> StoreResult<Job>;

    /// Record a terminal failure.
    async fn fail(&self, id: &JobId, error: ErrorInfo) -> StoreResult<Job>;
}

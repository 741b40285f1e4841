//! Application state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, Semaphore};

use mflow_models::JobId;
use mflow_storage::StorageClient;
use mflow_store::{JobStore, MemoryJobStore};
use mflow_worker::{JobDriver, WorkerConfig};

use crate::config::ApiConfig;

/// Cancellation handles for jobs currently running in this process.
#[derive(Default)]
pub struct RunningJobs {
    inner: Mutex<HashMap<JobId, watch::Sender<bool>>>,
}

impl RunningJobs {
    pub async fn insert(&self, id: JobId, handle: watch::Sender<bool>) {
        self.inner.lock().await.insert(id, handle);
    }

    /// Signal a running job; returns whether a handle existed.
    pub async fn cancel(&self, id: &JobId) -> bool {
        match self.inner.lock().await.get(id) {
            Some(handle) => handle.send(true).is_ok(),
            None => false,
        }
    }

    pub async fn remove(&self, id: &JobId) {
        self.inner.lock().await.remove(id);
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobStore>,
    pub driver: Arc<JobDriver>,
    pub running: Arc<RunningJobs>,
    pub job_slots: Arc<Semaphore>,
}

impl AppState {
    /// Production state: in-memory store, full storage client, driver over
    /// the global operator catalogue.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = StorageClient::from_env().await?;
        Ok(Self::assemble(config, Arc::new(MemoryJobStore::new()), storage))
    }

    /// State over explicit parts; used by tests and embedders.
    pub fn with_parts(config: ApiConfig, store: Arc<dyn JobStore>, storage: StorageClient) -> Self {
        Self::assemble(config, store, storage)
    }

    fn assemble(config: ApiConfig, store: Arc<dyn JobStore>, storage: StorageClient) -> Self {
        let worker_config = WorkerConfig::from_env();
        let slots = worker_config.max_concurrent_jobs.max(1);
        let driver = Arc::new(JobDriver::new(
            Arc::clone(&store),
            storage,
            mflow_ops::registry::global(),
            worker_config,
        ));

        Self {
            config,
            store,
            driver,
            running: Arc::new(RunningJobs::default()),
            job_slots: Arc::new(Semaphore::new(slots)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_handles_come_and_go() {
        let running = RunningJobs::default();
        let id = JobId::new();
        let (tx, rx) = watch::channel(false);

        running.insert(id.clone(), tx).await;
        assert!(running.cancel(&id).await);
        assert!(*rx.borrow());

        running.remove(&id).await;
        assert!(!running.cancel(&id).await);
    }
}

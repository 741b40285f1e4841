//! The job lifecycle driver.
//!
//! Drives a pending job through validating, planning, downloading,
//! processing and uploading, updating the store after each transition with
//! a coarse progress tick (10, 20, 30, 50, 90; capped at 90 until the
//! terminal transition). Cancellation is observed between phases and by
//! the subprocess runner.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use mflow_media::{
    probe, CommandBuilder, FfmpegRunner, LogCallback, MediaError, Progress, ProgressCallback,
};
use mflow_models::{ErrorInfo, JobId, JobStatus, OutputArtifact, ProcessingPlan};
use mflow_ops::OperatorRegistry;
use mflow_planner::{Graph, NodeKind, Planner};
use mflow_storage::{validate_uri, StagedJob, Stager, StorageClient};
use mflow_store::JobStore;

use crate::config::WorkerConfig;
use crate::error::DriveError;
use crate::logging::JobLogger;

/// Lines of stderr tail carried into the recorded execution error.
const ERROR_TAIL_LINES: usize = 5;

/// Drives submitted jobs through the state machine.
pub struct JobDriver {
    store: Arc<dyn JobStore>,
    planner: Planner,
    stager: Stager,
    config: WorkerConfig,
}

impl JobDriver {
    pub fn new(
        store: Arc<dyn JobStore>,
        storage: StorageClient,
        registry: Arc<OperatorRegistry>,
        config: WorkerConfig,
    ) -> Self {
        let stager = Stager::new(storage, &config.work_dir);
        Self {
            store,
            planner: Planner::new(registry),
            stager,
            config,
        }
    }

    /// Run one job to a terminal state. Never panics; every failure is
    /// recorded on the job record.
    pub async fn run(&self, job_id: JobId, cancel: watch::Receiver<bool>) {
        let logger = JobLogger::new(&job_id);

        match self.drive(&job_id, &logger, cancel).await {
            Ok(artifacts) => {
                let count = artifacts.len();
                match self.store.get(&job_id).await {
                    Ok(Some(job)) => {
                        if let Err(e) = self.store.update(job.complete(artifacts)).await {
                            logger.warning(&format!("failed to persist completion: {}", e));
                        }
                        logger.completed(count);
                    }
                    _ => logger.warning("job record vanished before completion"),
                }
            }
            Err(DriveError::Cancelled) => {
                if let Ok(Some(job)) = self.store.get(&job_id).await {
                    if !job.status.is_terminal() {
                        let _ = self.store.update(job.cancel()).await;
                    }
                }
                logger.cancelled();
            }
            Err(DriveError::Failed(info)) => {
                logger.failed(&info.code, &info.message);
                if let Err(e) = self.store.fail(&job_id, info).await {
                    logger.warning(&format!("failed to persist error: {}", e));
                }
            }
        }
    }

    async fn drive(
        &self,
        id: &JobId,
        logger: &JobLogger,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<OutputArtifact>, DriveError> {
        let job = self
            .store
            .get(id)
            .await
            .map_err(DriveError::execution)?
            .ok_or_else(|| DriveError::execution(format!("job '{}' missing from store", id)))?;
        if job.status.is_terminal() {
            return Err(DriveError::Cancelled);
        }
        let spec = job.spec;

        // Validating: spec structure, operator names, parameter bags, URIs.
        self.advance(id, JobStatus::Validating, 10, logger).await?;
        spec.validate().map_err(DriveError::validation)?;
        self.planner
            .validate_operators(&spec)
            .map_err(DriveError::validation)?;
        self.planner
            .validate_parameters(&spec)
            .map_err(DriveError::validation)?;
        for input in &spec.inputs {
            validate_uri(&input.source)
                .await
                .map_err(DriveError::validation)?;
        }
        for output in &spec.outputs {
            validate_uri(&output.destination)
                .await
                .map_err(DriveError::validation)?;
        }
        self.check_cancelled(id, &cancel).await?;

        // Planning: graph shape, order, stages. Estimates come later, once
        // inputs are staged and probed.
        self.advance(id, JobStatus::Planning, 20, logger).await?;
        let mut graph = self
            .planner
            .build_graph(&spec)
            .map_err(DriveError::validation)?;
        let shape_plan = self
            .planner
            .plan_graph(&mut graph)
            .map_err(DriveError::planning)?;
        self.attach_plan(id, shape_plan).await?;
        self.check_cancelled(id, &cancel).await?;

        // Downloading: stage inputs, then execute with guaranteed cleanup.
        self.advance(id, JobStatus::DownloadingInputs, 30, logger)
            .await?;
        let staged = self
            .stager
            .stage_inputs(id.as_str(), &mut graph)
            .await
            .map_err(DriveError::execution)?;

        let result = self
            .execute(id, logger, &mut graph, &staged, &cancel)
            .await;

        if let Err(e) = self.stager.cleanup(&staged).await {
            logger.warning(&format!("staging cleanup failed: {}", e));
        }
        result
    }

    /// Probe, re-plan with metadata, run the tool, upload.
    async fn execute(
        &self,
        id: &JobId,
        logger: &JobLogger,
        graph: &mut Graph,
        staged: &StagedJob,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Vec<OutputArtifact>, DriveError> {
        let input_ids: Vec<String> = graph
            .input_nodes()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        for node_id in input_ids {
            let path = match graph.node(&node_id).map(|n| &n.kind) {
                Some(NodeKind::Input {
                    staged: Some(path), ..
                }) => path.clone(),
                _ => {
                    return Err(DriveError::planning(format!(
                        "input node '{}' was not staged",
                        node_id
                    )))
                }
            };
            let info = probe(&path).await.map_err(DriveError::planning)?;
            if let Some(node) = graph.node_mut(&node_id) {
                node.set_media(info);
            }
        }
        self.check_cancelled(id, cancel).await?;

        let mut plan = self
            .planner
            .plan_graph(graph)
            .map_err(DriveError::planning)?;
        let argv = CommandBuilder::new(Arc::clone(self.planner.registry()))
            .with_binary(&self.config.ffmpeg_binary)
            .build(graph)
            .map_err(DriveError::planning)?;
        plan.command = Some(argv.clone());

        let total_secs = graph
            .output_nodes()
            .first()
            .and_then(|n| n.media())
            .map(|m| m.duration_secs())
            .unwrap_or(0.0);
        self.attach_plan(id, plan).await?;

        // Processing: runner progress maps into the 50..90 window.
        self.advance(id, JobStatus::Processing, 50, logger).await?;
        let store = Arc::clone(&self.store);
        let progress_id = id.clone();
        let on_progress: ProgressCallback = Arc::new(move |p: Progress| {
            let tick = (50.0 + p.percent * 0.4) as u8;
            let store = Arc::clone(&store);
            let job_id = progress_id.clone();
            tokio::spawn(async move {
                let _ = store.set_progress(&job_id, tick.min(90)).await;
            });
        });
        let log_id = id.to_string();
        let on_log: LogCallback = Arc::new(move |line: &str| {
            debug!(job_id = %log_id, "{}", line);
        });

        let mut run_args = argv;
        run_args.push("-y".to_string());
        FfmpegRunner::new()
            .with_total_duration(total_secs)
            .with_cancel(cancel.clone())
            .with_timeout(self.config.job_timeout)
            .run_with_callbacks(&run_args, on_progress, on_log)
            .await
            .map_err(classify_run_error)?;

        // Uploading: deliver each staged output to its destination.
        self.advance(id, JobStatus::UploadingOutputs, 90, logger)
            .await?;
        let artifacts = self
            .stager
            .upload_outputs(staged)
            .await
            .map_err(DriveError::execution)?;
        Ok(artifacts)
    }

    /// Record a status transition. A record that is already terminal means
    /// cancellation raced the driver.
    async fn advance(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: u8,
        logger: &JobLogger,
    ) -> Result<(), DriveError> {
        let job = self
            .store
            .set_status(id, status, progress)
            .await
            .map_err(DriveError::execution)?;
        if job.status.is_terminal() {
            return Err(DriveError::Cancelled);
        }
        logger.phase(status.as_str());
        Ok(())
    }

    async fn check_cancelled(
        &self,
        id: &JobId,
        cancel: &watch::Receiver<bool>,
    ) -> Result<(), DriveError> {
        if *cancel.borrow() {
            return Err(DriveError::Cancelled);
        }
        match self.store.get(id).await {
            Ok(Some(job)) if job.status == JobStatus::Cancelled => Err(DriveError::Cancelled),
            _ => Ok(()),
        }
    }

    async fn attach_plan(&self, id: &JobId, plan: ProcessingPlan) -> Result<(), DriveError> {
        let mut job = self
            .store
            .get(id)
            .await
            .map_err(DriveError::execution)?
            .ok_or_else(|| DriveError::execution(format!("job '{}' missing from store", id)))?;
        job.plan = Some(plan);
        self.store.update(job).await.map_err(DriveError::execution)
    }
}

/// Map runner errors to drive outcomes, folding the stderr tail into the
/// recorded message.
fn classify_run_error(err: MediaError) -> DriveError {
    match err {
        MediaError::Cancelled => DriveError::Cancelled,
        MediaError::FfmpegFailed {
            message, stderr, ..
        } => {
            let tail = stderr
                .map(|s| {
                    let lines: Vec<&str> = s.lines().collect();
                    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
                    lines[start..].join(" | ")
                })
                .unwrap_or_default();
            let full = if tail.is_empty() {
                format!("ffmpeg execution failed: {}", message)
            } else {
                format!("ffmpeg execution failed: {}: {}", message, tail)
            };
            DriveError::Failed(ErrorInfo::execution(full))
        }
        other => DriveError::execution(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mflow_models::{error_code, Job, JobSpec};
    use mflow_store::MemoryJobStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn spec(value: serde_json::Value) -> JobSpec {
        serde_json::from_value(value).unwrap()
    }

    fn driver(store: Arc<dyn JobStore>, work: &TempDir) -> JobDriver {
        let config = WorkerConfig {
            work_dir: work.path().to_string_lossy().into_owned(),
            ..WorkerConfig::default()
        };
        JobDriver::new(
            store,
            StorageClient::local_only(),
            mflow_ops::registry::global(),
            config,
        )
    }

    async fn submit(store: &Arc<MemoryJobStore>, spec: JobSpec) -> JobId {
        let job = Job::new(spec);
        let id = job.id.clone();
        store.create(job).await.unwrap();
        id
    }

    #[tokio::test]
    async fn unknown_operator_fails_validation() {
        let store = Arc::new(MemoryJobStore::new());
        let work = TempDir::new().unwrap();
        let id = submit(
            &store,
            spec(json!({
                "inputs": [{"id": "v", "source": "file:///in.mp4"}],
                "operations": [{"op": "warp", "input": "v", "output": "w", "params": {}}],
                "outputs": [{"id": "w", "destination": "file:///out.mp4"}]
            })),
        )
        .await;

        let (_tx, rx) = watch::channel(false);
        driver(store.clone() as Arc<dyn JobStore>, &work)
            .run(id.clone(), rx)
            .await;

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.code, error_code::VALIDATION_ERROR);
        assert!(!error.retryable);
        assert!(error.message.contains("unknown operator 'warp'"));
    }

    #[tokio::test]
    async fn ssrf_blocked_source_fails_validation() {
        let store = Arc::new(MemoryJobStore::new());
        let work = TempDir::new().unwrap();
        let id = submit(
            &store,
            spec(json!({
                "inputs": [{"id": "v", "source": "http://127.0.0.1/x.mp4"}],
                "operations": [],
                "outputs": [{"id": "v", "destination": "file:///out.mp4"}]
            })),
        )
        .await;

        let (_tx, rx) = watch::channel(false);
        driver(store.clone() as Arc<dyn JobStore>, &work)
            .run(id.clone(), rx)
            .await;

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().message.contains("localhost"));
    }

    #[tokio::test]
    async fn missing_input_fails_as_retryable_execution() {
        let store = Arc::new(MemoryJobStore::new());
        let work = TempDir::new().unwrap();
        let id = submit(
            &store,
            spec(json!({
                "inputs": [{"id": "v", "source": "file:///definitely/missing.mp4"}],
                "operations": [],
                "outputs": [{"id": "v", "destination": "file:///out.mp4"}]
            })),
        )
        .await;

        let (_tx, rx) = watch::channel(false);
        driver(store.clone() as Arc<dyn JobStore>, &work)
            .run(id.clone(), rx)
            .await;

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.code, error_code::EXECUTION_ERROR);
        assert!(error.retryable);
        // The shape plan was recorded before staging failed.
        assert!(job.plan.is_some());
    }

    #[tokio::test]
    async fn pre_cancelled_job_is_left_untouched() {
        let store = Arc::new(MemoryJobStore::new());
        let work = TempDir::new().unwrap();
        let id = submit(
            &store,
            spec(json!({
                "inputs": [{"id": "v", "source": "file:///in.mp4"}],
                "operations": [],
                "outputs": [{"id": "v", "destination": "file:///out.mp4"}]
            })),
        )
        .await;

        let cancelled = store.get(&id).await.unwrap().unwrap().cancel();
        store.update(cancelled).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        driver(store.clone() as Arc<dyn JobStore>, &work)
            .run(id.clone(), rx)
            .await;

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_signal_between_phases_cancels_the_job() {
        let store = Arc::new(MemoryJobStore::new());
        let work = TempDir::new().unwrap();
        let id = submit(
            &store,
            spec(json!({
                "inputs": [{"id": "v", "source": "file:///in.mp4"}],
                "operations": [],
                "outputs": [{"id": "v", "destination": "file:///out.mp4"}]
            })),
        )
        .await;

        let (tx, rx) = watch::channel(true);
        driver(store.clone() as Arc<dyn JobStore>, &work)
            .run(id.clone(), rx)
            .await;
        drop(tx);

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[test]
    fn run_error_classification() {
        assert!(matches!(
            classify_run_error(MediaError::Cancelled),
            DriveError::Cancelled
        ));

        let failed = classify_run_error(MediaError::FfmpegFailed {
            message: "exit status 1".to_string(),
            stderr: Some("a\nb\nc".to_string()),
            exit_code: Some(1),
        });
        match failed {
            DriveError::Failed(info) => {
                assert_eq!(info.code, error_code::EXECUTION_ERROR);
                assert!(info.message.contains("exit status 1"));
                assert!(info.message.contains("a | b | c"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}

//! Job submission, querying and cancellation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use mflow_models::{ErrorInfo, Job, JobId, JobSpec, JobStatus, OutputArtifact};
use mflow_planner::Planner;
use mflow_storage::validate_uri;
use mflow_store::{JobFilter, StoreError};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

/// POST /api/v1/jobs request body.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub spec: JobSpec,
}

/// POST /api/v1/jobs response.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: String,
}

/// Query parameters for job listings.
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Summary record returned by listings.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OutputArtifact>>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            progress: job.progress,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            error: job.error,
            outputs: job.outputs,
        }
    }
}

/// POST /api/v1/jobs
///
/// Validates the spec, screens every URI, persists a pending record and
/// fires the lifecycle driver in a background task.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(body): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let spec = body.spec;
    spec.validate()?;

    let planner = Planner::with_global_registry();
    planner.validate_operators(&spec)?;
    planner.validate_parameters(&spec)?;

    for input in &spec.inputs {
        validate_uri(&input.source).await?;
    }
    for output in &spec.outputs {
        validate_uri(&output.destination).await?;
    }

    let job = Job::new(spec);
    let job_id = job.id.clone();
    let created_at = job.created_at;

    state.store.create(job).await.map_err(|e| match e {
        StoreError::AlreadyExists(id) => ApiError::bad_request(format!("job '{}' already exists", id)),
        other => ApiError::internal(other.to_string()),
    })?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    state.running.insert(job_id.clone(), cancel_tx).await;

    // Fire and forget; concurrency is bounded by the slot semaphore.
    let driver = Arc::clone(&state.driver);
    let running = Arc::clone(&state.running);
    let slots = Arc::clone(&state.job_slots);
    let task_id = job_id.clone();
    tokio::spawn(async move {
        let Ok(_permit) = slots.acquire_owned().await else {
            return;
        };
        driver.run(task_id.clone(), cancel_rx).await;
        running.remove(&task_id).await;
    });

    info!(job_id = %job_id, "job submitted");
    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id: job_id.to_string(),
            status: JobStatus::Pending,
            created_at: created_at.to_rfc3339(),
        }),
    ))
}

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<JobSummary>>> {
    let status = match &query.status {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };

    let filter = JobFilter {
        status,
        limit: Some(query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)),
        offset: query.offset,
    };

    let jobs = state
        .store
        .list(filter)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(jobs.into_iter().map(JobSummary::from).collect()))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job_id = JobId::from_string(id);
    let job = state
        .store
        .get(&job_id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("job '{}'", job_id)))?;
    Ok(Json(job))
}

/// DELETE /api/v1/jobs/{id}
///
/// Transitions the job to cancelled and signals its runner. Terminal jobs
/// cannot be cancelled again.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let job_id = JobId::from_string(id);
    let job = state
        .store
        .get(&job_id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("job '{}'", job_id)))?;

    if job.status.is_terminal() {
        return Err(ApiError::bad_request(format!(
            "job is already {}",
            job.status
        )));
    }

    state
        .store
        .update(job.cancel())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    state.running.cancel(&job_id).await;

    info!(job_id = %job_id, "job cancelled");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_status(raw: &str) -> ApiResult<JobStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| ApiError::bad_request(format!("unknown status '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_parse() {
        assert_eq!(parse_status("pending").unwrap(), JobStatus::Pending);
        assert_eq!(
            parse_status("downloading_inputs").unwrap(),
            JobStatus::DownloadingInputs
        );
        assert!(parse_status("bogus").is_err());
    }
}

//! Job records and lifecycle states.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::plan::ProcessingPlan;
use crate::spec::JobSpec;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet picked up by the driver
    #[default]
    Pending,
    /// Spec and parameter validation in flight
    Validating,
    /// Graph compilation and estimation
    Planning,
    /// Remote inputs being staged locally
    DownloadingInputs,
    /// External tool running
    Processing,
    /// Produced files being pushed to their destinations
    UploadingOutputs,
    /// Terminal: all outputs delivered
    Completed,
    /// Terminal: recorded error
    Failed,
    /// Terminal: externally cancelled
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Validating => "validating",
            JobStatus::Planning => "planning",
            JobStatus::DownloadingInputs => "downloading_inputs",
            JobStatus::Processing => "processing",
            JobStatus::UploadingOutputs => "uploading_outputs",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error codes recorded on failed jobs.
pub mod error_code {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const PLANNING_ERROR: &str = "PLANNING_ERROR";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    pub const CANCELLED: &str = "CANCELLED";
}

/// Structured error information on a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ErrorInfo {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: error_code::VALIDATION_ERROR.to_string(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn planning(message: impl Into<String>) -> Self {
        Self {
            code: error_code::PLANNING_ERROR.to_string(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            code: error_code::EXECUTION_ERROR.to_string(),
            message: message.into(),
            retryable: true,
        }
    }
}

/// A delivered output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputArtifact {
    /// Symbolic output id from the spec
    pub id: String,
    /// Destination URI the file was delivered to
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// A job record as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub spec: JobSpec,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ProcessingPlan>,

    #[serde(default)]
    pub status: JobStatus,

    /// Coarse progress, 0-100
    #[serde(default)]
    pub progress: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OutputArtifact>>,
}

impl Job {
    /// Create a new pending job for a spec.
    pub fn new(spec: JobSpec) -> Self {
        let id = spec
            .id
            .clone()
            .map(JobId::from_string)
            .unwrap_or_default();
        let now = Utc::now();

        Self {
            id,
            created_at: now,
            updated_at: now,
            spec,
            plan: None,
            status: JobStatus::Pending,
            progress: 0,
            error: None,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            outputs: None,
        }
    }

    /// Advance to a non-terminal status with a coarse progress tick.
    /// No-op on terminal records.
    pub fn with_status(mut self, status: JobStatus, progress: u8) -> Self {
        if self.status.is_terminal() {
            return self;
        }
        if self.started_at.is_none() && status != JobStatus::Pending {
            self.started_at = Some(Utc::now());
        }
        self.status = status;
        // Clamp at 90 until the terminal transition.
        self.progress = progress.min(90);
        self.updated_at = Utc::now();
        self
    }

    /// Update only the progress figure, clamped at 90.
    pub fn with_progress(mut self, progress: u8) -> Self {
        if self.status.is_terminal() {
            return self;
        }
        self.progress = progress.min(90);
        self.updated_at = Utc::now();
        self
    }

    /// Terminal success.
    pub fn complete(mut self, outputs: Vec<OutputArtifact>) -> Self {
        if self.status.is_terminal() {
            return self;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.outputs = Some(outputs);
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Terminal failure with structured error info.
    pub fn fail(mut self, error: ErrorInfo) -> Self {
        if self.status.is_terminal() {
            return self;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.retry_count += 1;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Terminal cancellation.
    pub fn cancel(mut self) -> Self {
        if self.status.is_terminal() {
            return self;
        }
        self.status = JobStatus::Cancelled;
        self.error = Some(ErrorInfo {
            code: error_code::CANCELLED.to_string(),
            message: "job cancelled".to_string(),
            retryable: false,
        });
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_spec() -> JobSpec {
        serde_json::from_value(serde_json::json!({
            "inputs": [{"id": "video", "source": "file:///in.mp4"}],
            "operations": [],
            "outputs": [{"id": "video", "destination": "file:///out.mp4"}]
        }))
        .unwrap()
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::DownloadingInputs).unwrap();
        assert_eq!(json, "\"downloading_inputs\"");
    }

    #[test]
    fn lifecycle_transitions() {
        let job = Job::new(minimal_spec());
        assert_eq!(job.status, JobStatus::Pending);

        let job = job.with_status(JobStatus::Validating, 10);
        assert_eq!(job.status, JobStatus::Validating);
        assert_eq!(job.progress, 10);
        assert!(job.started_at.is_some());

        let job = job.complete(Vec::new());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn progress_clamps_at_90_before_terminal() {
        let job = Job::new(minimal_spec()).with_progress(97);
        assert_eq!(job.progress, 90);
    }

    #[test]
    fn terminal_records_ignore_transitions() {
        let job = Job::new(minimal_spec()).cancel();
        assert_eq!(job.status, JobStatus::Cancelled);

        let unchanged = job.clone().fail(ErrorInfo::execution("late failure"));
        assert_eq!(unchanged.status, JobStatus::Cancelled);

        let unchanged = job.with_status(JobStatus::Processing, 50);
        assert_eq!(unchanged.status, JobStatus::Cancelled);
    }

    #[test]
    fn fail_records_error_info() {
        let job = Job::new(minimal_spec()).fail(ErrorInfo::planning("metadata missing"));
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.code, error_code::PLANNING_ERROR);
        assert!(!error.retryable);
        assert_eq!(job.retry_count, 1);
    }
}

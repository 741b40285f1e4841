//! Structured job logging.

use tracing::{error, info, warn, Span};

use mflow_models::JobId;

/// Tags every lifecycle event with the owning job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
        }
    }

    pub fn phase(&self, phase: &str) {
        info!(job_id = %self.job_id, phase, "job phase");
    }

    pub fn progress(&self, progress: u8) {
        info!(job_id = %self.job_id, progress, "job progress");
    }

    pub fn warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "job warning: {}", message);
    }

    pub fn failed(&self, code: &str, message: &str) {
        error!(job_id = %self.job_id, code, "job failed: {}", message);
    }

    pub fn completed(&self, outputs: usize) {
        info!(job_id = %self.job_id, outputs, "job completed");
    }

    pub fn cancelled(&self) {
        info!(job_id = %self.job_id, "job cancelled");
    }

    /// Span carrying the job id for nested work.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }
}

//! Worker configuration.

use std::time::Duration;

/// Configuration for job execution.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// External tool binary name or path
    pub ffmpeg_binary: String,
    /// Root for per-job staging directories
    pub work_dir: String,
    /// Maximum jobs running at once
    pub max_concurrent_jobs: usize,
    /// Hard timeout for one tool invocation
    pub job_timeout: Duration,
    /// Graceful shutdown window
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            work_dir: "/tmp/mediaflow".to_string(),
            max_concurrent_jobs: 4,
            job_timeout: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            ffmpeg_binary: std::env::var("FFMPEG_BINARY").unwrap_or_else(|_| "ffmpeg".to_string()),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .unwrap_or_else(|_| "/tmp/mediaflow".to_string()),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

//! Subprocess runner with progress streaming and cancellation.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{Progress, ProgressParser};

/// Lines of stderr kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// Callback invoked on every parsed progress sample.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Callback invoked on every stderr/stdout line.
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Runs the external tool, scanning both output pipes concurrently.
pub struct FfmpegRunner {
    parser: ProgressParser,
    cancel: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            parser: ProgressParser::new(),
            cancel: None,
            timeout: None,
        }
    }

    /// Provide the total output duration so progress carries a percentage.
    pub fn with_total_duration(mut self, total_secs: f64) -> Self {
        self.parser.set_total_duration(total_secs);
        self
    }

    /// Observe a cancellation signal; `true` terminates the child.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the command to completion.
    pub async fn run(&self, args: &[String]) -> MediaResult<()> {
        self.run_with_callbacks(args, Arc::new(|_| {}), Arc::new(|_| {}))
            .await
    }

    /// Run the command, streaming progress and log lines to the callbacks.
    /// Blocks until the tool exits and both scanners finish.
    pub async fn run_with_callbacks(
        &self,
        args: &[String],
        on_progress: ProgressCallback,
        on_log: LogCallback,
    ) -> MediaResult<()> {
        let (binary, rest) = args.split_first().ok_or(MediaError::EmptyCommand)?;

        which::which(binary).map_err(|_| MediaError::ToolNotFound(binary.clone()))?;
        debug!(binary = %binary, "spawning external tool");

        let mut child = Command::new(binary)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("stderr not captured", None, None)
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("stdout not captured", None, None)
        })?;

        // Dedicated scanner per pipe; the stderr one also extracts progress
        // and collects a tail for error reporting.
        let parser = self.parser.clone();
        let stderr_log = Arc::clone(&on_log);
        let stderr_task: JoinHandle<Vec<String>> = tokio::spawn(async move {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(progress) = parser.parse_line(&line) {
                    on_progress(progress);
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
                stderr_log(&line);
            }
            tail.into_iter().collect()
        });

        let stdout_task = spawn_line_scanner(stdout, on_log);

        let wait_result = self.wait_for_exit(&mut child).await;

        // Pipes close on child exit; both scanners drain and finish.
        let tail = stderr_task.await.unwrap_or_default();
        let _ = stdout_task.await;

        let status = wait_result?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                format!("exit status {}", status.code().unwrap_or(-1)),
                Some(tail.join("\n")),
                status.code(),
            ))
        }
    }

    /// Wait for the child, honouring cancellation and the optional timeout.
    async fn wait_for_exit(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        let cancel = self.cancel.clone();
        let wait = wait_cancellable(child, cancel);

        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "child timed out, killing");
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    Err(MediaError::Timeout(timeout.as_secs()))
                }
            },
            None => wait.await,
        }
    }
}

/// Wait for the child, killing it if the cancel signal flips to `true`.
async fn wait_cancellable(
    child: &mut Child,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<std::process::ExitStatus> {
    let Some(mut rx) = cancel else {
        return child.wait().await.map_err(MediaError::from);
    };

    loop {
        tokio::select! {
            status = child.wait() => return status.map_err(MediaError::from),
            changed = rx.changed() => {
                match changed {
                    Ok(()) => {
                        if *rx.borrow() {
                            info!("cancellation requested, terminating child");
                            let _ = child.kill().await;
                            let _ = child.wait().await;
                            return Err(MediaError::Cancelled);
                        }
                    }
                    // Sender gone; nobody can cancel any more.
                    Err(_) => return child.wait().await.map_err(MediaError::from),
                }
            }
        }
    }
}

fn spawn_line_scanner<R>(pipe: R, on_log: LogCallback) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            on_log(&line);
        }
    })
}

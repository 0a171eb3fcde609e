// Attempt runner - one yt-dlp process per credential source
//
// The runner never retries. It reports exactly one outcome per call and
// leaves the retry decision to the fallback controllers.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::credentials::CredentialSource;
use super::diagnostics::{diagnose_error, summarize_stderr};
use super::progress::classify;

/// Result of one worker invocation
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Exit 0. `output` is the worker's stdout (empty in streaming mode).
    Success { output: String },
    /// The credential was rejected; another source may work
    AuthFailure { detail: String },
    /// Anything else; retrying with other credentials will not help
    FatalFailure { detail: String },
    /// The worker could not be started for this source
    BinaryUnavailable { detail: String },
    /// Streaming mode only: the session was cancelled and the worker killed
    Cancelled,
}

impl AttemptOutcome {
    /// Outcomes after which the next credential source should be tried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthFailure { .. } | Self::BinaryUnavailable { .. })
    }

    /// A failure after progress was visible is a real failure, not a
    /// credential problem.
    pub fn after_progress(self, progress_observed: bool) -> Self {
        match self {
            Self::AuthFailure { detail } if progress_observed => Self::FatalFailure { detail },
            other => other,
        }
    }
}

/// How the worker's output is consumed
#[derive(Debug)]
pub enum RunMode {
    /// Collect all output; kill the worker after `timeout`
    Capture { timeout: Duration },
    /// Forward stdout lines as they arrive until the worker exits or `cancel` fires
    Stream {
        lines: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    },
}

/// Runs one attempt for one credential source
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn run(&self, source: &CredentialSource, args: &[String], mode: RunMode) -> AttemptOutcome;
}

/// Process-backed runner for the yt-dlp binary (or `python -m yt_dlp`)
#[derive(Debug, Clone)]
pub struct YtDlpRunner {
    program: String,
    prefix_args: Vec<String>,
}

impl YtDlpRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Run yt-dlp as a Python module through the given interpreter
    pub fn python_module(python: impl Into<String>) -> Self {
        Self::new(python).with_prefix_args(["-m", "yt_dlp"])
    }

    /// Arguments placed before the credential arguments
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn(&self, source: &CredentialSource, args: &[String]) -> std::io::Result<Child> {
        TokioCommand::new(&self.program)
            .args(&self.prefix_args)
            .args(source.ytdlp_args())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }

    async fn run_capture(&self, mut child: Child, limit: Duration) -> AttemptOutcome {
        let (stdout_task, stderr_task) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (read_all(out), read_all(err)),
            _ => {
                return AttemptOutcome::FatalFailure {
                    detail: format!("Failed to capture output from {}", self.program),
                }
            }
        };

        let status = match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                return AttemptOutcome::FatalFailure {
                    detail: format!("Failed to wait for {}: {}", self.program, e),
                };
            }
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return AttemptOutcome::FatalFailure {
                    detail: format!("Timed out after {}s", limit.as_secs()),
                };
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        classify_exit(status, stdout, &stderr, false, true)
    }

    async fn run_stream(
        &self,
        mut child: Child,
        lines_tx: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> AttemptOutcome {
        let (stdout, stderr_task) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, read_all(err)),
            _ => {
                return AttemptOutcome::FatalFailure {
                    detail: format!("Failed to capture output from {}", self.program),
                }
            }
        };

        // Split on raw bytes: a non-UTF-8 line must not stop the stream
        let mut lines = BufReader::new(stdout).split(b'\n');
        let mut progress_observed = false;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    return cancel_child(&mut child, stderr_task).await;
                }

                segment = lines.next_segment() => match segment {
                    Ok(Some(bytes)) => {
                        let line = String::from_utf8_lossy(&bytes)
                            .trim_end_matches('\r')
                            .to_string();
                        if !progress_observed && classify(&line).is_progress() {
                            progress_observed = true;
                        }
                        // Receiver gone means nobody is listening; keep draining
                        let _ = lines_tx.send(line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // An undrained pipe would block the worker forever
                        tracing::warn!("[runner] Failed to read stdout: {}", e);
                        if let Err(kill_err) = child.kill().await {
                            tracing::warn!("[runner] Failed to kill worker: {}", kill_err);
                        }
                        stderr_task.abort();
                        return AttemptOutcome::FatalFailure {
                            detail: format!("Failed to read output from {}: {}", self.program, e),
                        };
                    }
                },
            }
        }

        let status = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return cancel_child(&mut child, stderr_task).await;
            }

            status = child.wait() => status,
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                stderr_task.abort();
                return AttemptOutcome::FatalFailure {
                    detail: format!("Failed to wait for {}: {}", self.program, e),
                };
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        classify_exit(status, String::new(), &stderr, progress_observed, false)
    }
}

#[async_trait]
impl AttemptRunner for YtDlpRunner {
    async fn run(&self, source: &CredentialSource, args: &[String], mode: RunMode) -> AttemptOutcome {
        let child = match self.spawn(source, args) {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("[runner] Failed to start {} for {}: {}", self.program, source, e);
                return AttemptOutcome::BinaryUnavailable {
                    detail: format!("Failed to start {}: {}", self.program, e),
                };
            }
        };

        tracing::debug!(
            "[runner] Started {} (pid {:?}) with {} ({:?})",
            self.program,
            child.id(),
            source,
            source.kind()
        );

        match mode {
            RunMode::Capture { timeout } => self.run_capture(child, timeout).await,
            RunMode::Stream { lines, cancel } => self.run_stream(child, lines, cancel).await,
        }
    }
}

/// Map a finished worker to an outcome.
///
/// `require_output` rejects an exit 0 with blank stdout (metadata queries).
fn classify_exit(
    status: ExitStatus,
    stdout: String,
    stderr: &str,
    progress_observed: bool,
    require_output: bool,
) -> AttemptOutcome {
    if status.success() {
        if require_output && stdout.trim().is_empty() {
            return AttemptOutcome::FatalFailure {
                detail: summarize_stderr(stderr)
                    .unwrap_or_else(|| "yt-dlp produced no output".to_string()),
            };
        }
        return AttemptOutcome::Success { output: stdout };
    }

    let detail = summarize_stderr(stderr).unwrap_or_else(|| match status.code() {
        Some(code) => format!("yt-dlp exited with status {}", code),
        None => "yt-dlp was terminated by a signal".to_string(),
    });

    if progress_observed {
        return AttemptOutcome::FatalFailure { detail };
    }

    match diagnose_error(stderr) {
        Some(marker) => {
            tracing::info!("[runner] Credential rejected: {}", marker.description());
            AttemptOutcome::AuthFailure { detail }
        }
        None => AttemptOutcome::FatalFailure { detail },
    }
}

fn read_all<R>(mut pipe: R) -> JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            tracing::debug!("[runner] Pipe read failed: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn cancel_child(child: &mut Child, stderr_task: JoinHandle<String>) -> AttemptOutcome {
    if let Err(e) = child.kill().await {
        tracing::warn!("[runner] Failed to kill worker: {}", e);
    }
    stderr_task.abort();
    tracing::info!("[runner] Worker terminated after cancellation");
    AttemptOutcome::Cancelled
}

// Streaming download session with credential fallback
//
// One task per session. Attempts run strictly one after another; each
// attempt's stdout is classified line by line while the worker runs.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::credentials::CredentialSource;
use super::events::{SessionEmitter, SessionEvent};
use super::models::OutputFormat;
use super::progress::{classify, LineEvent};
use super::runner::{AttemptOutcome, AttemptRunner, RunMode};

pub const AUTH_FAILED_MESSAGE: &str =
    "No credential source could authenticate. Upload a cookies.txt file.";
pub const CANCELLED_MESSAGE: &str = "Download cancelled";

/// Everything one session needs, resolved before it starts
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    /// Effective credential sources, in order
    pub sources: Vec<CredentialSource>,
    /// Operation arguments shared by every attempt
    pub args: Vec<String>,
    pub format: OutputFormat,
    pub download_dir: PathBuf,
}

/// Caller's handle on a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Stop the session and kill its worker. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this session when cancelled (or when its drop guard drops)
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current_index: usize,
    /// Reset at the start of every attempt
    has_observed_progress: bool,
    /// Set once per session
    authenticated_announced: bool,
    cancelled: bool,
}

struct DownloadSession {
    runner: Arc<dyn AttemptRunner>,
    plan: DownloadPlan,
    state: SessionState,
    emitter: SessionEmitter,
    cancel: CancellationToken,
}

/// Start a session on the current runtime.
///
/// The receiver yields the session's events and closes after the terminal one.
pub fn spawn_session(
    runner: Arc<dyn AttemptRunner>,
    plan: DownloadPlan,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (emitter, events) = SessionEmitter::channel();
    let cancel = CancellationToken::new();

    let session = DownloadSession {
        runner,
        plan,
        state: SessionState::default(),
        emitter,
        cancel: cancel.clone(),
    };
    tokio::spawn(session.run());

    (SessionHandle { cancel }, events)
}

impl DownloadSession {
    async fn run(mut self) {
        self.emitter.start();

        loop {
            if self.state.cancelled || self.cancel.is_cancelled() {
                self.finish_cancelled();
                return;
            }

            let Some(source) = self.plan.sources.get(self.state.current_index).cloned() else {
                tracing::warn!(
                    "[download] All {} credential sources failed",
                    self.plan.sources.len()
                );
                self.emitter.auth_failed(AUTH_FAILED_MESSAGE);
                return;
            };

            tracing::info!(
                "[download] Attempt {}/{} via {}",
                self.state.current_index + 1,
                self.plan.sources.len(),
                source
            );

            match self.attempt(&source).await {
                AttemptOutcome::Success { .. } => {
                    let message = format!(
                        "Saved to {} as {} ✓",
                        self.plan.download_dir.display(),
                        self.plan.format
                    );
                    tracing::info!("[download] Finished via {}", source);
                    self.emitter.done(message, self.plan.format.extension());
                    return;
                }
                AttemptOutcome::AuthFailure { detail } => {
                    tracing::info!("[download] {} rejected: {}", source, detail);
                    self.state.current_index += 1;
                }
                AttemptOutcome::BinaryUnavailable { detail } => {
                    tracing::warn!("[download] {} unavailable: {}", source, detail);
                    self.state.current_index += 1;
                }
                AttemptOutcome::FatalFailure { detail } => {
                    tracing::warn!("[download] Failed via {}: {}", source, detail);
                    self.emitter.error(detail);
                    return;
                }
                AttemptOutcome::Cancelled => {
                    self.finish_cancelled();
                    return;
                }
            }
        }
    }

    /// Run one attempt, turning its output into events as it arrives
    async fn attempt(&mut self, source: &CredentialSource) -> AttemptOutcome {
        self.state.has_observed_progress = false;

        let (lines_tx, mut lines_rx) = mpsc::unbounded_channel();
        let mode = RunMode::Stream {
            lines: lines_tx,
            cancel: self.cancel.clone(),
        };

        let run = self.runner.run(source, &self.plan.args, mode);

        let state = &mut self.state;
        let emitter = &mut self.emitter;
        let cancel = &self.cancel;
        let consume = async move {
            // Ends when the runner drops its sender
            while let Some(line) = lines_rx.recv().await {
                if cancel.is_cancelled() {
                    state.cancelled = true;
                }
                if !state.cancelled {
                    handle_line(state, emitter, source, &line);
                }
            }
        };

        let (outcome, ()) = tokio::join!(run, consume);
        outcome.after_progress(self.state.has_observed_progress)
    }

    fn finish_cancelled(&mut self) {
        self.state.cancelled = true;
        tracing::info!(
            "[download] Cancelled at source {}/{}",
            self.state.current_index + 1,
            self.plan.sources.len()
        );
        self.emitter.error(CANCELLED_MESSAGE);
    }
}

fn handle_line(
    state: &mut SessionState,
    emitter: &mut SessionEmitter,
    source: &CredentialSource,
    line: &str,
) {
    match classify(line) {
        LineEvent::Progress(progress) => {
            state.has_observed_progress = true;
            if !state.authenticated_announced {
                state.authenticated_announced = true;
                emitter.info(format!("Authenticated via {}", source.label()));
            }
            emitter.progress(progress);
        }
        LineEvent::Destination { filename } => emitter.info(format!("Saving: {}", filename)),
        LineEvent::MergeNotice => emitter.info("Merging audio & video…"),
        LineEvent::Unclassified => tracing::trace!("[yt-dlp] {}", line),
    }
}

// Session events streamed to the client
//
// Every session ends with exactly one terminal event (done, error or
// auth_failed); the emitter drops anything sent after it.

use serde::Serialize;
use tokio::sync::mpsc;

use super::progress::ProgressEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Start { message: String },
    Info { message: String },
    Progress { percent: f64, speed: String, eta: String },
    Done { message: String, output: String },
    Error { message: String },
    AuthFailed { message: String },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::Error { .. } | Self::AuthFailed { .. }
        )
    }
}

impl From<ProgressEvent> for SessionEvent {
    fn from(p: ProgressEvent) -> Self {
        Self::Progress {
            percent: p.percent,
            speed: p.speed,
            eta: p.eta,
        }
    }
}

/// Ordered, non-blocking sink for one session's events
#[derive(Debug)]
pub struct SessionEmitter {
    tx: mpsc::UnboundedSender<SessionEvent>,
    finished: bool,
}

impl SessionEmitter {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx, finished: false }
    }

    /// Emitter plus the receiving end handed to the consumer
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn start(&mut self) {
        self.emit(SessionEvent::Start {
            message: "Starting download…".to_string(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.emit(SessionEvent::Info {
            message: message.into(),
        });
    }

    pub fn progress(&mut self, progress: ProgressEvent) {
        self.emit(progress.into());
    }

    pub fn done(&mut self, message: impl Into<String>, output: impl Into<String>) {
        self.emit(SessionEvent::Done {
            message: message.into(),
            output: output.into(),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(SessionEvent::Error {
            message: message.into(),
        });
    }

    pub fn auth_failed(&mut self, message: impl Into<String>) {
        self.emit(SessionEvent::AuthFailed {
            message: message.into(),
        });
    }

    /// Returns false when the event was dropped
    fn emit(&mut self, event: SessionEvent) -> bool {
        if self.finished {
            tracing::debug!(?event, "[session] Dropping event after terminal event");
            return false;
        }
        self.finished = event.is_terminal();

        // A closed receiver just means the client went away
        self.tx.send(event).is_ok()
    }
}

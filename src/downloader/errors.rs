// Error types for the credential-fallback downloader

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Every credential source was rejected (or its worker could not start)
    #[error("No credential source could authenticate ({attempts} tried)")]
    AuthFailed { attempts: usize },

    /// Worker failed for a reason unrelated to authentication
    #[error("{0}")]
    Worker(String),

    /// Worker succeeded but its output was not the expected JSON
    #[error("Failed to parse video info: {0}")]
    MalformedOutput(String),

    /// Request had no `url`
    #[error("Missing url")]
    MissingUrl,

    /// Caller cancelled the session
    #[error("Download cancelled")]
    Cancelled,

    /// Local filesystem failure (cookie upload)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Stable discriminant for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthFailed { .. } => "AUTH_FAILED",
            Self::Worker(_) => "WORKER_FAILED",
            Self::MalformedOutput(_) => "MALFORMED_OUTPUT",
            Self::MissingUrl => "MISSING_URL",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO",
        }
    }

    pub fn is_auth_failed(&self) -> bool {
        matches!(self, Self::AuthFailed { .. })
    }
}

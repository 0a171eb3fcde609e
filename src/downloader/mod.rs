// Downloader module - credential-fallback execution engine

pub mod credentials;
pub mod diagnostics;
pub mod errors;
pub mod events;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod session;

pub use credentials::{CookieStore, CredentialRegistry, CredentialSource};
pub use errors::DownloadError;
pub use events::SessionEvent;
pub use models::{DownloadRequest, OutputFormat, Quality, VideoMetadata};
pub use orchestrator::Downloader;
pub use runner::{AttemptOutcome, AttemptRunner, RunMode, YtDlpRunner};
pub use session::SessionHandle;

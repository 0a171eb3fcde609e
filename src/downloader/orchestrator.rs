// Orchestrator - wires the registry, runner and both fallback controllers

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::credentials::{CookieStore, CredentialRegistry};
use super::errors::DownloadError;
use super::events::SessionEvent;
use super::metadata::fetch_metadata;
use super::models::{DownloadRequest, VideoMetadata};
use super::runner::{AttemptRunner, YtDlpRunner};
use super::session::{spawn_session, DownloadPlan, SessionHandle};
use crate::config::{Config, NetworkConfig};
use crate::ytdlp::{download_args, info_args};

#[derive(Clone)]
pub struct Downloader {
    runner: Arc<dyn AttemptRunner>,
    registry: CredentialRegistry,
    network: NetworkConfig,
    download_dir: PathBuf,
    info_timeout: Duration,
}

impl Downloader {
    pub fn new(
        runner: Arc<dyn AttemptRunner>,
        registry: CredentialRegistry,
        network: NetworkConfig,
        download_dir: PathBuf,
        info_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            registry,
            network,
            download_dir,
            info_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let runner = match &config.ytdlp_python {
            Some(python) => YtDlpRunner::python_module(python.clone()),
            None => YtDlpRunner::new(config.ytdlp_bin.clone()),
        };
        tracing::info!("[Downloader] Using worker: {}", runner.program());

        let registry = CredentialRegistry::new(
            CookieStore::new(config.cookies_file.clone()),
            config.browsers.clone(),
        );

        Self::new(
            Arc::new(runner),
            registry,
            config.network.clone(),
            config.download_dir.clone(),
            config.info_timeout,
        )
    }

    pub fn credentials(&self) -> &CredentialRegistry {
        &self.registry
    }

    /// Metadata for `url`, trying each effective credential source in turn
    pub async fn get_video_info(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::MissingUrl);
        }

        let sources = self.registry.effective_sources();
        let args = info_args(url, &self.network);
        fetch_metadata(self.runner.as_ref(), &sources, &args, self.info_timeout).await
    }

    /// Start a download session. Sources are resolved now, once per session.
    pub fn download(
        &self,
        request: DownloadRequest,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        tracing::info!(
            "[Downloader] Download {} ({:?}, {})",
            request.url,
            request.quality,
            request.format
        );

        let plan = DownloadPlan {
            sources: self.registry.effective_sources(),
            args: download_args(&request, &self.download_dir, &self.network),
            format: request.format,
            download_dir: self.download_dir.clone(),
        };
        spawn_session(self.runner.clone(), plan)
    }
}

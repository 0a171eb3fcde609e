pub mod config;
pub mod downloader;
pub mod server;
pub mod ytdlp;

use anyhow::Context;

use config::Config;
use downloader::Downloader;
use server::AppState;

/// Serve the web interface until the process is stopped
pub async fn run(config: Config) -> anyhow::Result<()> {
    let downloader = Downloader::from_config(&config);
    tracing::info!(
        "Downloads go to {}, cookies file {}",
        config.download_dir.display(),
        config.cookies_file.display()
    );

    let app = server::router(AppState { downloader }, config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    tracing::info!("✓ YT Downloader running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

use anyhow::Context;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use ytdlp_web::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().context("Invalid configuration")?;
    ytdlp_web::run(config).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ytdlp_web=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

use anyhow::Result;
use platform_runtime::{load_config, Platform};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config();
    config.validate()?;

    let platform = Platform::start(&config).await?;
    info!("platform running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    platform.shutdown().await;
    Ok(())
}

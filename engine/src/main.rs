use anyhow::Result;
use engine::state::AppState;
use shared::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    tracing::info!("starting tidetrader engine");
    let app = AppState::new(config).await?;

    app.scheduler.start().await?;
    tracing::info!("scheduler running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    // Teardown mirrors the init order in reverse
    app.scheduler.shutdown().await?;
    app.db.close().await?;
    tracing::info!("engine stopped");
    Ok(())
}

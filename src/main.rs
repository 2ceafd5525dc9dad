mod config; // brings `config.rs` in as `crate::config`
mod scenario; // brings `scenario.rs` in as `crate::scenario`

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Lanesim started. Loading configuration and building the lane catalog...");

    let settings = config::load_settings().context("failed to load configuration")?;
    let catalog = Arc::new(scenario::build_catalog(&settings.map).context("failed to build lane catalog")?);
    info!(entries = catalog.len(), lanes = catalog.lanes().count(), "Lane catalog ready");

    // The catalog is immutable, so every robot reads it concurrently
    let matching = Arc::new(settings.matching);
    let mut tasks = JoinSet::new();
    for robot in settings.robots {
        let catalog = Arc::clone(&catalog);
        let matching = Arc::clone(&matching);
        info!(robot = %robot.name, "Spawning scenario task...");
        tasks.spawn_blocking(move || scenario::run_robot(&catalog, &matching, &robot));
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("scenario task panicked")? {
            Ok(report) => info!(%report, "Scenario finished"),
            Err(e) => {
                failures += 1;
                error!("Scenario failed: {:#}", e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} scenario(s) failed", failures);
    }
    info!("All scenarios finished.");
    Ok(())
}

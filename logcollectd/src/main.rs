use anyhow::Result;
use clap::Parser;

use logcollect_core::config::LogcollectConfig;
use logcollectd::cli::DaemonCli;
use logcollectd::logging;
use logcollectd::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // file (or defaults) -> environment -> command line
    let mut config = match &cli.config {
        Some(path) => LogcollectConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => LogcollectConfig::default(),
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logcollectd starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    if let Err(e) = orchestrator.run().await {
        tracing::error!(error = %e, "logcollectd failed");
        return Err(e);
    }

    let stats = orchestrator.stats();
    tracing::info!(
        received = stats.received,
        persisted = stats.persisted,
        dropped = stats.dropped,
        "logcollectd shut down"
    );
    Ok(())
}

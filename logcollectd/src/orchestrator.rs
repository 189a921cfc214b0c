//! Collector orchestration -- configuration, lifecycle, and signal handling.
//!
//! The [`Orchestrator`] turns a validated [`LogcollectConfig`] into a running
//! [`LogCollector`], waits for a shutdown trigger, then stops the collector
//! so every record still queued is written before the process exits.
//!
//! # Startup Order
//!
//! 1. Metrics recorder (if enabled)
//! 2. Storage directory check and initial bucket
//! 3. UDP socket bind
//! 4. Listener, persistence worker, archival sweep
//!
//! Any failure in steps 2-3 aborts startup.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Result;

use logcollect_collector::{
    CollectorConfig, LogCollector, LogCollectorBuilder, StatsSnapshot, running_privileged,
};
use logcollect_core::config::LogcollectConfig;

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogcollectConfig,
    /// The collector pipeline.
    collector: LogCollector,
}

impl Orchestrator {
    /// Load configuration from a file and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogcollectConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// The default port is chosen from the effective user id when the
    /// configuration leaves it unset.
    pub fn build_from_config(config: LogcollectConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let collector_config = CollectorConfig::from_core(&config, running_privileged())
            .map_err(|e| anyhow::anyhow!("invalid collector config: {}", e))?;
        tracing::debug!(?collector_config, "collector configuration resolved");

        let collector = LogCollectorBuilder::new()
            .config(collector_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build collector: {}", e))?;

        Ok(Self { config, collector })
    }

    /// Start the collector and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        })
        .await
    }

    /// Start the collector, wait for `shutdown` to complete, then stop it.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.collector
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start collector: {}", e))?;

        tracing::info!(
            addr = ?self.collector.local_addr(),
            dir = %self.config.storage.dir,
            "logcollectd running"
        );

        shutdown.await;

        self.collector
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop collector: {}", e))?;
        Ok(())
    }

    /// Counters of the underlying collector.
    pub fn stats(&self) -> StatsSnapshot {
        self.collector.stats()
    }

    /// Bound UDP address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.collector.local_addr()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogcollectConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

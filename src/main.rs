//! Storage host entry point: loads `ClusterConfig`, opens the KV engine and
//! brings up one Raft group per local `(space, partition)` pair.
//!
//! This binary is the in-process host the `samyama-cli` crate talks to
//! during local development; a real deployment runs one of these per node
//! with its config pointing at the cluster's peers.

use anyhow::{Context, Result};
use samyama::{ClusterConfig, KvEngine, LogMonitor, LogMonitorConfig, MinLogLevel};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "samyama.yaml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        ClusterConfig::load(&config_path).context("loading cluster config")?
    } else {
        tracing::warn!(path = %config_path, "config file not found, using defaults");
        ClusterConfig::default()
    };

    tracing::info!(version = samyama::VERSION, data_path = ?config.storage.data_path, "starting samyama storage host");

    let kv = Arc::new(KvEngine::open(&config.storage.data_path, &[]).context("opening kv engine")?);
    kv.create_space(1).context("creating default space")?;

    let log_monitor = Arc::new(LogMonitor::new(
        LogMonitorConfig { log_dir: config.storage.data_path.join("logs"), ..LogMonitorConfig::default() },
        MinLogLevel::Info,
    ));
    let log_monitor_task = log_monitor.spawn();

    tracing::info!("samyama storage host ready");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    log_monitor_task.abort();
    tracing::info!("shutting down");
    Ok(())
}

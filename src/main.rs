//! TideKV - A Networked Key-Value Store
//!
//! This is the main entry point for the TideKV server.
//! It opens the storage engine, replays the append-only log, starts the
//! expiry sweeper and serves clients until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tidekv::config::{EngineConfig, ServerConfig, SyncPolicy, DEFAULT_ADDR};
use tidekv::server::Server;
use tidekv::storage::StorageEngine;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// TideKV Server
#[derive(Parser, Debug)]
#[command(name = "tidekv")]
#[command(about = "Networked key-value store with TTL expiry and an append-only log")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    listen: String,

    /// Append-only log file; omit to run purely in memory
    #[arg(short, long)]
    aof: Option<PathBuf>,

    /// Flush every log append to stable storage before replying
    #[arg(long)]
    sync_always: bool,

    /// Milliseconds between background expiry sweeps
    #[arg(long, default_value = "1000")]
    sweep_interval_ms: u64,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let mut builder = EngineConfig::builder()
            .sync_policy(if self.sync_always {
                SyncPolicy::Always
            } else {
                SyncPolicy::OsDefault
            })
            .sweep_interval(Duration::from_millis(self.sweep_interval_ms.max(1)));

        if let Some(path) = &self.aof {
            builder = builder.aof_path(path);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = Args::parse();
    let engine_config = args.engine_config();

    info!("TideKV v{}", tidekv::VERSION);

    // Open the storage engine; a log that cannot be opened or read is fatal
    let storage = StorageEngine::open(&engine_config).with_context(|| match &engine_config.aof_path {
        Some(path) => format!("failed to open append-only log {}", path.display()),
        None => "failed to open storage engine".to_string(),
    })?;
    let storage = Arc::new(storage);
    info!(keys = storage.len(), persistent = storage.is_persistent(), "Storage engine ready");

    // Start the background expiry sweeper
    storage.start_background_expiration(engine_config.sweep_interval);

    let server = Server::bind(&ServerConfig::new(&args.listen), Arc::clone(&storage))
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;

    info!("Ready to accept connections. Use Ctrl+C to shutdown gracefully.");

    server
        .run(async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    storage
        .shutdown()
        .await
        .context("failed to close append-only log")?;

    info!("Server shutdown complete");
    Ok(())
}

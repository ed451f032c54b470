use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use blockwatch_core::{
    config::IndexerConfig, gateway::http::HttpGatewayProvider, listener::BlockListenerManager,
    service::Daemon, storage::SqliteBlockStore,
};
use clap::Parser;
use log::info;

use crate::common::BLOCKWATCH_DB_PATH;

/// 10 seconds.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
pub struct Start {
    /// Path to the indexer configuration file (JSON)
    #[clap(long, env)]
    config: PathBuf,
    /// Path to the SQLite database file
    #[clap(long, env, default_value = BLOCKWATCH_DB_PATH)]
    db: PathBuf,
}

impl Start {
    pub async fn run(self) -> Result<()> {
        let config: IndexerConfig = serde_json::from_slice(&std::fs::read(&self.config)?)?;

        let store = SqliteBlockStore::new(&self.db.to_string_lossy()).await?;
        let provider = HttpGatewayProvider::new(&config.channel_name, &config.organizations)?;
        let manager = BlockListenerManager::new(
            provider,
            store,
            config.organization_names(),
            config.retry_interval(),
        );

        let manager_shutdown = manager.shutdown_handle();
        manager.start();

        let mut sigterm_handle =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        let ctrl_c_handle = tokio::signal::ctrl_c();

        tokio::select! {
            _ = sigterm_handle.recv() => {},
            _ = ctrl_c_handle => {},
            _ = manager_shutdown.finished() => {},
        }

        // Graceful shutdown
        info!("Shutting down block listeners");
        manager_shutdown.shutdown();
        tokio::select! {
            _ = tokio::time::sleep(GRACEFUL_SHUTDOWN_TIMEOUT) => {
                Err(anyhow::anyhow!("timeout waiting for graceful shutdown"))
            },
            _ = manager_shutdown.finished() => {
                Ok(())
            },
        }
    }
}

//! The process-wide application context: built once from [`AppConfig`], then lent to every
//! invocation by reference.

use anyhow::{Context as _, Result};
use group_snapshot_core::assemble::DocumentAssembler;
use group_snapshot_core::contract::BlobTarget;
use group_snapshot_core::snapshot::{snapshot, SnapshotReport};

use crate::blob::BlobStorageClient;
use crate::graph::GraphClient;
use crate::load_config::{AppConfig, STORAGE_CONNECTION_ENV};

pub struct AppContext {
    pub directory: GraphClient,
    pub publisher: BlobStorageClient,
    pub assembler: DocumentAssembler,
    pub target: BlobTarget,
}

impl AppContext {
    /// Validates every setting the snapshot needs. No network calls happen here.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let connection_string = config
            .storage
            .connection_string
            .as_ref()
            .with_context(|| format!("{STORAGE_CONNECTION_ENV} environment variable not set"))?;
        let publisher = BlobStorageClient::from_connection_string(connection_string.expose())
            .context("invalid storage connection string")?;
        let directory =
            GraphClient::new(&config.directory).context("invalid directory settings")?;

        Ok(AppContext {
            directory,
            publisher,
            assembler: DocumentAssembler::with_page_size(config.directory.page_size),
            target: config.storage.target.clone(),
        })
    }

    /// One scheduled invocation.
    pub async fn run_snapshot(&self) -> Result<SnapshotReport> {
        let report = snapshot(
            &self.assembler,
            &self.directory,
            &self.publisher,
            &self.target,
        )
        .await?;
        Ok(report)
    }
}

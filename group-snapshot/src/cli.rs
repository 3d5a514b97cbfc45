///
/// This module implements the CLI interface for group-snapshot: command parsing, the async
/// entrypoint, and the boundary where every failure is turned into log output.
///
/// All assembly logic lives in the [`group-snapshot-core`] crate; this module only wires the
/// configured HTTP collaborators into it.
///
/// ## How To Use
/// - A scheduler invokes `group-snapshot run --config <file>` once per tick.
/// - `preview` renders the document without publishing it.
/// - `users` and `memberships` expose the remaining directory reads for inspection.
///
/// [`group-snapshot-core`]: ../../group-snapshot-core/
use crate::context::AppContext;
use crate::graph::GraphClient;
use crate::load_config::load_config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use group_snapshot_core::assemble::{render_document, Assembly, DocumentAssembler};
use group_snapshot_core::contract::DirectoryClient;
use group_snapshot_core::query::DirectoryQuery;
use group_snapshot_core::snapshot::SnapshotReport;
use std::path::PathBuf;
use tracing::Instrument;

/// CLI for group-snapshot: publish a JSON snapshot of directory groups, owners and members.
#[derive(Parser)]
#[clap(
    name = "group-snapshot",
    version,
    about = "Snapshot directory groups with their owners and members into blob storage"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one snapshot invocation: assemble the document and overwrite the blob
    Run {
        /// Path to the YAML settings file
        #[clap(long)]
        config: PathBuf,
    },
    /// Assemble and print the document without publishing it
    Preview {
        /// Path to the YAML settings file
        #[clap(long)]
        config: PathBuf,
        /// Write the document here instead of stdout
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// List directory users as JSON
    Users {
        /// Path to the YAML settings file
        #[clap(long)]
        config: PathBuf,
    },
    /// List the groups a group is a member of, as JSON
    Memberships {
        /// Path to the YAML settings file
        #[clap(long)]
        config: PathBuf,
        /// Id of the group to inspect
        #[clap(long)]
        group: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("cli_started");

    match cli.command {
        Commands::Run { config } => {
            let invocation_id = uuid::Uuid::new_v4();
            run_invocation(config)
                .instrument(tracing::info_span!("invocation", id = %invocation_id))
                .await
        }
        Commands::Preview { config, output } => {
            let config = load_config(config)?;
            let directory = GraphClient::new(&config.directory)?;
            directory.authenticate().await?;
            let assembler = DocumentAssembler::with_page_size(config.directory.page_size);
            let text = match assembler.build(&directory).await? {
                Assembly::Empty => {
                    tracing::info!(command = "preview", "No results returned");
                    "[]".to_string()
                }
                Assembly::Document(root) => render_document(&root)?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, &text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(command = "preview", path = %path.display(), bytes = text.len(), "Preview written");
                }
                None => println!("{text}"),
            }
            Ok(())
        }
        Commands::Users { config } => {
            let config = load_config(config)?;
            let directory = GraphClient::new(&config.directory)?;
            directory.authenticate().await?;
            let users = directory
                .list_users(&DirectoryQuery::users().top(config.directory.page_size))
                .await?
                .unwrap_or_default();
            tracing::info!(command = "users", count = users.len(), "Users listed");
            println!("{}", serde_json::to_string_pretty(&users)?);
            Ok(())
        }
        Commands::Memberships { config, group } => {
            let config = load_config(config)?;
            let directory = GraphClient::new(&config.directory)?;
            directory.authenticate().await?;
            let memberships = directory
                .list_group_memberships(&group, &DirectoryQuery::group_memberships())
                .await?
                .with_context(|| format!("no memberships returned for group {group}"))?;
            tracing::info!(
                command = "memberships",
                group = %group,
                count = memberships.len(),
                "Group memberships listed"
            );
            println!("{}", serde_json::to_string_pretty(&memberships)?);
            Ok(())
        }
    }
}

/// One scheduled invocation: configuration, then the snapshot pipeline. Failures are logged
/// here and returned so the hosting runtime sees a failed run.
async fn run_invocation(config: PathBuf) -> Result<()> {
    tracing::info!(
        started_at = %chrono::Utc::now().to_rfc3339(),
        "Snapshot invocation started"
    );

    let config = load_config(config)?;
    let context = AppContext::from_config(&config)?;
    match context.run_snapshot().await {
        Ok(SnapshotReport::Skipped) => {
            tracing::info!(command = "run", "No groups returned; nothing published");
            Ok(())
        }
        Ok(SnapshotReport::Published(published)) => {
            tracing::info!(
                command = "run",
                groups = published.group_count,
                bytes = published.bytes,
                sha256 = %published.content_sha256,
                "Snapshot published"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "run", error = %e, "Snapshot failed");
            Err(e)
        }
    }
}

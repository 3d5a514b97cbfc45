//! High-level pipeline: authenticate → assemble → render → publish.
//!
//! This module provides the top-level orchestration for one scheduled invocation. It:
//!   - Authenticates the directory client before any read
//!   - Assembles the group document via [`DocumentAssembler`]
//!   - Skips publishing entirely when the directory has no groups
//!   - Renders the document once and overwrites the configured blob
//!   - Returns a report of what was written
//!
//! # Error Handling
//! Each failed step returns immediately with a [`SnapshotError`]; nothing is published after a
//! failure. Callers log the error and wait for the next invocation. There are no retries.
//!
//! # Navigation
//! - Main entrypoint: [`snapshot`]
//! - Supporting types: [`SnapshotReport`], [`PublishedSnapshot`].

use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::assemble::{render_document, Assembly, DocumentAssembler};
use crate::contract::{BlobPublisher, BlobTarget, DirectoryClient, PublishReceipt};
use crate::error::SnapshotError;

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotReport {
    /// The directory returned no groups; the blob was left untouched.
    Skipped,
    Published(PublishedSnapshot),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSnapshot {
    pub target: BlobTarget,
    pub group_count: usize,
    pub bytes: usize,
    /// Hex SHA-256 of the uploaded text.
    pub content_sha256: String,
    pub receipt: PublishReceipt,
}

pub async fn snapshot<D, P>(
    assembler: &DocumentAssembler,
    directory: &D,
    publisher: &P,
    target: &BlobTarget,
) -> Result<SnapshotReport, SnapshotError>
where
    D: DirectoryClient + ?Sized,
    P: BlobPublisher + ?Sized,
{
    info!("[SNAPSHOT] Starting snapshot pipeline");

    if let Err(e) = directory.authenticate().await {
        error!(error = %e, "[SNAPSHOT][ERROR] Directory authentication failed");
        return Err(SnapshotError::Authentication(e));
    }
    info!("[SNAPSHOT] Directory client authenticated");

    let root = match assembler.build(directory).await? {
        Assembly::Empty => {
            info!("[SNAPSHOT] No results returned, skipping publish");
            return Ok(SnapshotReport::Skipped);
        }
        Assembly::Document(root) => root,
    };

    let text = render_document(&root).map_err(|e| {
        error!(error = %e, "[SNAPSHOT][ERROR] Failed to render document");
        e
    })?;
    let content_sha256 = format!("{:x}", Sha256::digest(text.as_bytes()));

    info!(
        container = %target.container,
        blob = %target.blob_name,
        bytes = text.len(),
        groups = root.len(),
        "[SNAPSHOT][PUBLISH] Uploading document"
    );
    let receipt = match publisher.publish(target, &text).await {
        Ok(receipt) => receipt,
        Err(e) => {
            error!(error = %e, blob = %target.blob_name, "[SNAPSHOT][ERROR][PUBLISH] Upload failed");
            return Err(e.into());
        }
    };
    info!(
        sha256 = %content_sha256,
        etag = receipt.etag.as_deref().unwrap_or(""),
        "[SNAPSHOT][PUBLISH] JSON file updated and uploaded successfully"
    );

    Ok(SnapshotReport::Published(PublishedSnapshot {
        target: target.clone(),
        group_count: root.len(),
        bytes: text.len(),
        content_sha256,
        receipt,
    }))
}

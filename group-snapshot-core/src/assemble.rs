//! Document assembly: groups → properties → owners → members, stitched into one tree.
//!
//! [`DocumentAssembler::build`] enumerates every group once, then walks them sequentially in
//! enumeration order. For each group it reads the projected properties, the owners and the
//! user-typed members. The first read that comes back without a payload abandons the whole
//! document: partial documents are never returned.
//!
//! [`render_document`] turns the result into the published text in a single serialization pass.

use tracing::{debug, error, info, warn};

use crate::contract::DirectoryClient;
use crate::error::{AssemblyStep, SnapshotError};
use crate::model::{DocumentRoot, GroupDocument};
use crate::query::DirectoryQuery;

/// Result of a successful assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// The directory has no groups. Nothing should be published.
    Empty,
    Document(DocumentRoot),
}

/// Drives the directory reads that make up one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    /// Optional `$top` for the group enumeration.
    pub page_size: Option<u32>,
}

impl DocumentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: Option<u32>) -> Self {
        DocumentAssembler { page_size }
    }

    pub async fn build<D>(&self, directory: &D) -> Result<Assembly, SnapshotError>
    where
        D: DirectoryClient + ?Sized,
    {
        info!("[ASSEMBLE] Enumerating groups");
        let groups = directory
            .list_groups(&DirectoryQuery::groups().top(self.page_size))
            .await?
            .ok_or_else(|| {
                warn!("[ASSEMBLE] Group enumeration returned no payload");
                SnapshotError::UpstreamEmptyResult {
                    step: AssemblyStep::ListGroups,
                    group_id: None,
                }
            })?;

        if groups.is_empty() {
            info!("[ASSEMBLE] Directory returned zero groups");
            return Ok(Assembly::Empty);
        }
        info!(count = groups.len(), "[ASSEMBLE] Groups enumerated");

        let properties_query = DirectoryQuery::group_properties();
        let owners_query = DirectoryQuery::owners();
        let members_query = DirectoryQuery::user_members();

        let mut documents = Vec::with_capacity(groups.len());
        for (position, listed) in groups.iter().enumerate() {
            let id = match listed.id.as_deref() {
                Some(id) if !id.is_empty() => id,
                _ => {
                    error!(position, "[ASSEMBLE][ERROR] Enumerated group has no id");
                    return Err(SnapshotError::MissingGroupId { position });
                }
            };

            let group = directory
                .get_group(id, &properties_query)
                .await?
                .ok_or_else(|| absent(AssemblyStep::GroupProperties, id))?;

            let owners = directory
                .list_owners(id, &owners_query)
                .await?
                .ok_or_else(|| absent(AssemblyStep::Owners, id))?;

            let members = directory
                .list_members(id, &members_query)
                .await?
                .ok_or_else(|| absent(AssemblyStep::Members, id))?;

            debug!(
                group_id = id,
                owners = owners.len(),
                members = members.len(),
                "[ASSEMBLE] Group assembled"
            );
            documents.push(GroupDocument {
                id: id.to_string(),
                group,
                owners,
                members,
            });
        }

        info!(groups = documents.len(), "[ASSEMBLE] Document assembled");
        Ok(Assembly::Document(DocumentRoot { groups: documents }))
    }
}

fn absent(step: AssemblyStep, group_id: &str) -> SnapshotError {
    warn!(group_id, %step, "[ASSEMBLE] No results returned, abandoning document");
    SnapshotError::UpstreamEmptyResult {
        step,
        group_id: Some(group_id.to_string()),
    }
}

/// Serialize a document as an indented JSON array of group records.
pub fn render_document(root: &DocumentRoot) -> Result<String, SnapshotError> {
    let text = serde_json::to_string_pretty(&root.records())?;
    Ok(text)
}

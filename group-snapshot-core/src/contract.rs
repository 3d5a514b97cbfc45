//! # contract: collaborator interfaces for the snapshot pipeline
//!
//! This module defines the two seams the pipeline talks through:
//! - [`DirectoryClient`]: authenticated, paginated reads against the directory service.
//! - [`BlobPublisher`]: an all-or-nothing overwrite of one named object in blob storage.
//!
//! ## Absent payloads
//! Every directory read returns `Result<Option<_>, DirectoryError>`. `Ok(None)` means the
//! directory answered but carried no payload (missing `value`, 404 on a single resource).
//! The assembler treats that as a reason to abandon the document; transport and decoding
//! failures travel in the `Err` arm instead.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so tests can script directory and storage
//!   behaviour without a network. The mocks are exported behind the `test-export-mocks`
//!   feature for use from integration tests and dependent crates.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{DirectoryError, PublishError};
use crate::model::{DirectoryUser, Group, GroupMembership, Principal};
use crate::query::DirectoryQuery;

/// Container used when none is configured.
pub const DEFAULT_CONTAINER: &str = "mycontainer";
/// Object name used when none is configured.
pub const DEFAULT_BLOB_NAME: &str = "PT1H.json";

/// Where the finished document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobTarget {
    pub container: String,
    pub blob_name: String,
}

impl Default for BlobTarget {
    fn default() -> Self {
        BlobTarget {
            container: DEFAULT_CONTAINER.to_string(),
            blob_name: DEFAULT_BLOB_NAME.to_string(),
        }
    }
}

/// Returned by the blob store after a successful overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Read access to the directory service.
///
/// Implementations handle credentials, paging and transport. All list operations return
/// every page concatenated, in the order the directory produced them.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Obtain (or confirm) credentials before any read is issued.
    async fn authenticate(&self) -> Result<(), DirectoryError>;

    /// Enumerate all groups.
    async fn list_groups(
        &self,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<Group>>, DirectoryError>;

    /// Fetch a single group by id.
    async fn get_group(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Group>, DirectoryError>;

    async fn list_owners(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<Principal>>, DirectoryError>;

    /// List members of a group. `query.of_type` narrows the relationship to one object type.
    async fn list_members(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<Principal>>, DirectoryError>;

    /// List the groups this group is itself a member of.
    async fn list_group_memberships(
        &self,
        group_id: &str,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<GroupMembership>>, DirectoryError>;

    async fn list_users(
        &self,
        query: &DirectoryQuery,
    ) -> Result<Option<Vec<DirectoryUser>>, DirectoryError>;
}

/// Write access to blob storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BlobPublisher: Send + Sync {
    /// Replace the object at `target` with `content`. Either the whole text is stored or
    /// nothing is.
    async fn publish(
        &self,
        target: &BlobTarget,
        content: &str,
    ) -> Result<PublishReceipt, PublishError>;
}

//! Error types shared by the collaborators and the snapshot pipeline.

use thiserror::Error;

/// Errors raised by a [`crate::contract::DirectoryClient`] implementation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Credential exchange with the identity provider failed.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The request never produced an HTTP response.
    #[error("directory transport error: {message}")]
    Transport { message: String },

    /// The directory answered with a non-success status.
    #[error("directory returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// The response body did not match the expected shape.
    #[error("failed to decode directory response: {message}")]
    Decode { message: String },
}

/// Errors raised by a [`crate::contract::BlobPublisher`] implementation.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("blob transport error: {message}")]
    Transport { message: String },

    #[error("blob store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request could not be signed (bad account key, malformed endpoint).
    #[error("failed to sign blob request: {message}")]
    Signing { message: String },
}

/// Which per-group read came back without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStep {
    ListGroups,
    GroupProperties,
    Owners,
    Members,
}

impl std::fmt::Display for AssemblyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssemblyStep::ListGroups => "list_groups",
            AssemblyStep::GroupProperties => "group_properties",
            AssemblyStep::Owners => "owners",
            AssemblyStep::Members => "members",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of a failed snapshot invocation.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("could not sign in to the directory: {0}")]
    Authentication(#[source] DirectoryError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A read returned an absent payload. The whole document is abandoned.
    #[error("no results returned at step {step} (group: {})", group_id.as_deref().unwrap_or("-"))]
    UpstreamEmptyResult {
        step: AssemblyStep,
        group_id: Option<String>,
    },

    /// A group arrived without an identifier, so its sub-resources cannot be addressed.
    #[error("group at position {position} has no id")]
    MissingGroupId { position: usize },

    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

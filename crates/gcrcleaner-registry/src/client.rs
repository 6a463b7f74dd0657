//! Registry client contract and manifest metadata.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::name::Repository;

/// Registry-side metadata for one manifest digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSummary {
    /// Tags currently pointing at the digest. Possibly empty.
    pub tags: Vec<String>,
    /// When the image was built, as recorded in its config.
    pub created: DateTime<Utc>,
    /// When the manifest was uploaded to this repository.
    pub uploaded: DateTime<Utc>,
}

/// The transport contract the cleaning engine runs against.
///
/// Implementations must be safe for concurrent use; the engine issues
/// deletions from many tasks at once.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Lists every manifest in the repository, keyed by content digest.
    async fn list_manifests(&self, repo: &Repository)
    -> Result<BTreeMap<String, ManifestSummary>>;

    /// Deletes a single tag reference.
    async fn delete_tag(&self, repo: &Repository, tag: &str) -> Result<()>;

    /// Deletes a manifest by content digest.
    async fn delete_digest(&self, repo: &Repository, digest: &str) -> Result<()>;

    /// Enumerates every repository path hosted by the registry.
    async fn catalog(&self, registry: &str) -> Result<Vec<String>>;
}

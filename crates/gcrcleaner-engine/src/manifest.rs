//! Manifest value object.

use chrono::{DateTime, Utc};
use gcrcleaner_registry::ManifestSummary;

/// One image in one repository, as reported by the registry.
///
/// Immutable after construction; the engine only reads it.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Fully-qualified repository name.
    pub repo: String,
    /// Content digest identifying the manifest.
    pub digest: String,
    /// Registry-side metadata.
    pub summary: ManifestSummary,
}

impl Manifest {
    /// Creates a manifest record.
    #[must_use]
    pub fn new(repo: String, digest: String, summary: ManifestSummary) -> Self {
        Self {
            repo,
            digest,
            summary,
        }
    }

    /// Tags currently pointing at this digest.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.summary.tags
    }

    /// Build timestamp recorded in the image config.
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.summary.created
    }

    /// When the manifest was uploaded to the repository.
    #[must_use]
    pub fn uploaded(&self) -> DateTime<Utc> {
        self.summary.uploaded
    }
}

//! Error types for registry transport operations.

use thiserror::Error;

/// Marker substring returned by the registry when a manifest index still has
/// live child manifests. Deleting the index becomes possible once the
/// children are gone, so this class of failure is retryable.
pub const DANGLING_PARENT_MARKER: &str = "GOOGLE_MANIFEST_DANGLING_PARENT_IMAGE";

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while talking to a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A repository or registry name could not be parsed.
    #[error("invalid name {name:?}: {message}")]
    Name {
        /// The offending input.
        name: String,
        /// What made it invalid.
        message: String,
    },

    /// The HTTP request could not be performed at all.
    #[error("transport error for {context}: {source}")]
    Transport {
        /// The request that failed.
        context: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The registry answered with a non-success status.
    #[error("registry responded {status} for {context}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The request that failed.
        context: String,
        /// Response body, as returned by the registry.
        message: String,
    },

    /// No usable credential could be resolved.
    #[error("credential resolution failed: {message}")]
    Auth {
        /// What went wrong.
        message: String,
    },
}

impl RegistryError {
    /// True when this is the retryable dangling-parent signal: a manifest
    /// index whose children still exist.
    #[must_use]
    pub fn is_dangling_parent(&self) -> bool {
        matches!(self, Self::Api { message, .. } if message.contains(DANGLING_PARENT_MARKER))
    }
}

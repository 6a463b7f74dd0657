//! Repository name handling.

use std::fmt;

use crate::error::{RegistryError, Result};

/// A fully-qualified repository: the registry host plus the repository path.
///
/// The textual form is `host/path`, e.g. `gcr.io/my-project/my-image`. The
/// host must be recognizable as such (contain a dot or a port, or be
/// `localhost`), which is the same heuristic docker itself applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Repository {
    registry: String,
    repo: String,
}

impl Repository {
    /// Parses a `host/path` repository name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Name`] when the input has no path component
    /// or its first segment does not look like a registry host.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let Some((registry, repo)) = trimmed.split_once('/') else {
            return Err(RegistryError::Name {
                name: input.to_string(),
                message: "expected <registry>/<repository>".to_string(),
            });
        };

        if !is_registry_host(registry) {
            return Err(RegistryError::Name {
                name: input.to_string(),
                message: format!("{registry:?} does not look like a registry host"),
            });
        }
        if repo.is_empty() || repo.ends_with('/') {
            return Err(RegistryError::Name {
                name: input.to_string(),
                message: "repository path must not be empty".to_string(),
            });
        }

        Ok(Self {
            registry: registry.to_string(),
            repo: repo.to_string(),
        })
    }

    /// The registry host, e.g. `gcr.io`.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// The repository path within the registry, e.g. `my-project/my-image`.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repo)
    }
}

/// A bare hostname is a registry when it carries a dot or a port, or is
/// `localhost`; everything else would be a docker-hub shorthand we do not
/// guess at.
#[must_use]
pub fn is_registry_host(host: &str) -> bool {
    !host.is_empty() && (host == "localhost" || host.contains('.') || host.contains(':'))
}

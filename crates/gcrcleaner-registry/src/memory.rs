//! In-memory registry fake for tests.
//!
//! Behaves like a small Docker-v2 registry: tags reference digests, a digest
//! cannot be deleted while tags still point at it, and deletions are
//! recorded in call order so tests can assert ordering guarantees. Faults
//! can be injected per digest (the dangling-parent signal) or globally
//! (simulating credential failures).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::client::{ManifestSummary, RegistryClient};
use crate::error::{DANGLING_PARENT_MARKER, RegistryError, Result};
use crate::name::Repository;

/// In-memory [`RegistryClient`] for tests.
#[derive(Default)]
pub struct MemoryRegistry {
    repos: Mutex<HashMap<String, BTreeMap<String, ManifestSummary>>>,
    deletions: Mutex<Vec<String>>,
    dangling: Mutex<HashMap<String, usize>>,
    digest_failure: Mutex<Option<String>>,
    digest_attempts: AtomicUsize,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a manifest to a repository (`host/path` form).
    pub fn insert_manifest(&self, repo: &str, digest: &str, summary: ManifestSummary) {
        self.repos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(repo.to_string())
            .or_default()
            .insert(digest.to_string(), summary);
    }

    /// Makes the next `times` deletion attempts for `digest` fail with the
    /// dangling-parent signal before succeeding.
    pub fn fail_digest_with_dangling_parent(&self, digest: &str, times: usize) {
        self.dangling
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(digest.to_string(), times);
    }

    /// Makes every digest deletion fail terminally with the given message.
    pub fn fail_digests_with(&self, message: &str) {
        *self
            .digest_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    /// Every deleted reference (tags and digests) in call order.
    #[must_use]
    pub fn deletions(&self) -> Vec<String> {
        self.deletions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of digest deletion attempts, including failed ones.
    #[must_use]
    pub fn digest_attempts(&self) -> usize {
        self.digest_attempts.load(Ordering::SeqCst)
    }

    /// Current manifests of a repository.
    #[must_use]
    pub fn manifests(&self, repo: &str) -> BTreeMap<String, ManifestSummary> {
        self.repos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, reference: &str) {
        self.deletions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reference.to_string());
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn list_manifests(
        &self,
        repo: &Repository,
    ) -> Result<BTreeMap<String, ManifestSummary>> {
        let repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        repos
            .get(&repo.to_string())
            .cloned()
            .ok_or_else(|| RegistryError::Api {
                status: 404,
                context: repo.to_string(),
                message: "repository not found".to_string(),
            })
    }

    async fn delete_tag(&self, repo: &Repository, tag: &str) -> Result<()> {
        let mut repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        let manifests = repos
            .get_mut(&repo.to_string())
            .ok_or_else(|| RegistryError::Api {
                status: 404,
                context: repo.to_string(),
                message: "repository not found".to_string(),
            })?;

        let Some(summary) = manifests
            .values_mut()
            .find(|summary| summary.tags.iter().any(|t| t == tag))
        else {
            return Err(RegistryError::Api {
                status: 404,
                context: format!("{repo}:{tag}"),
                message: "tag not found".to_string(),
            });
        };
        summary.tags.retain(|t| t != tag);
        drop(repos);

        self.record(tag);
        Ok(())
    }

    async fn delete_digest(&self, repo: &Repository, digest: &str) -> Result<()> {
        self.digest_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self
            .digest_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(RegistryError::Api {
                status: 403,
                context: format!("{repo}@{digest}"),
                message,
            });
        }

        {
            let mut dangling = self.dangling.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(remaining) = dangling.get_mut(digest) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RegistryError::Api {
                        status: 400,
                        context: format!("{repo}@{digest}"),
                        message: format!(
                            "manifest is referenced by a parent image: {DANGLING_PARENT_MARKER}"
                        ),
                    });
                }
            }
        }

        let mut repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        let manifests = repos
            .get_mut(&repo.to_string())
            .ok_or_else(|| RegistryError::Api {
                status: 404,
                context: repo.to_string(),
                message: "repository not found".to_string(),
            })?;

        let Some(summary) = manifests.get(digest) else {
            return Err(RegistryError::Api {
                status: 404,
                context: format!("{repo}@{digest}"),
                message: "manifest not found".to_string(),
            });
        };
        if !summary.tags.is_empty() {
            return Err(RegistryError::Api {
                status: 400,
                context: format!("{repo}@{digest}"),
                message: "manifest is still referenced by tags".to_string(),
            });
        }
        manifests.remove(digest);
        drop(repos);

        self.record(digest);
        Ok(())
    }

    async fn catalog(&self, registry: &str) -> Result<Vec<String>> {
        let prefix = format!("{registry}/");
        let repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        let mut listed: Vec<String> = repos
            .keys()
            .filter_map(|name| name.strip_prefix(&prefix).map(ToString::to_string))
            .collect();
        listed.sort();
        Ok(listed)
    }
}

//! Per-repository cleaning engine.
//!
//! Deletion is two-phase: every tag reference of a selected manifest is
//! removed before its digest, because registries refuse to delete a
//! manifest that still has live tags. Digest deletions that fail with the
//! registry's dangling-parent signal (a multi-arch index whose children
//! still exist) are parked and retried for a bounded number of passes,
//! by which point the children have been deleted.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use gcrcleaner_core::worker::WorkerPool;
use gcrcleaner_registry::{RegistryClient, Repository};

use crate::discovery;
use crate::error::{EngineError, Result};
use crate::manifest::Manifest;
use crate::policy::RetentionPolicy;

/// Retry passes granted to digests parked on the dangling-parent signal.
/// Manifest-index DAGs are shallow in practice; three passes drain them.
const DANGLING_PARENT_RETRIES: usize = 3;

/// Outcome of one deletion task.
#[derive(Debug)]
enum DeleteOutcome {
    /// The reference was removed (or would have been, under dry-run).
    Deleted(String),
    /// The digest was parked for another pass.
    Requeued,
    /// Short-circuited by the first-error guard.
    Skipped,
}

/// Per-repository cleaning engine.
pub struct Cleaner {
    registry: Arc<dyn RegistryClient>,
    concurrency: usize,
}

impl Cleaner {
    /// Creates a cleaner issuing at most `concurrency` parallel deletions
    /// per repository (0 = one per available CPU core).
    #[must_use]
    pub fn new(registry: Arc<dyn RegistryClient>, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency,
        }
    }

    /// Deletes stale manifests from one repository.
    ///
    /// Returns the deleted references (tags and digests), sorted and free of
    /// duplicates.
    ///
    /// # Errors
    ///
    /// Returns a single error verbatim, or an aggregate of distinct failure
    /// messages. Partial deletions are not rolled back.
    pub async fn clean(&self, repo: &str, policy: &RetentionPolicy) -> Result<Vec<String>> {
        let repository = Repository::parse(repo)?;
        tracing::debug!(repo = %repository, "computed repository");

        let listed = self.registry.list_manifests(&repository).await?;

        let mut manifests: Vec<Manifest> = listed
            .into_iter()
            .map(|(digest, summary)| Manifest::new(repository.to_string(), digest, summary))
            .collect();
        sort_by_freshness(&mut manifests);

        let pool: WorkerPool<DeleteOutcome, EngineError> = WorkerPool::new(self.concurrency);
        let failed = Arc::new(AtomicBool::new(false));
        let parked: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut kept = 0usize;
        let mut digests_to_delete: Vec<String> = Vec::new();

        for m in &manifests {
            tracing::debug!(
                repo = %m.repo,
                digest = %m.digest,
                tags = ?m.tags(),
                uploaded = %m.uploaded(),
                "processing manifest"
            );

            if !policy.should_delete(m) {
                continue;
            }

            if kept < policy.keep {
                tracing::debug!(
                    repo = %m.repo,
                    digest = %m.digest,
                    keep = policy.keep,
                    kept,
                    "skipping deletion because of keep count"
                );
                kept += 1;
                continue;
            }

            digests_to_delete.push(m.digest.clone());

            for tag in m.tags() {
                let registry = Arc::clone(&self.registry);
                let repository = repository.clone();
                let digest = m.digest.clone();
                let tag = tag.clone();
                let dry_run = policy.dry_run;

                pool.submit(async move {
                    tracing::debug!(repo = %repository, digest = %digest, tag = %tag, "deleting tag");
                    if !dry_run {
                        registry.delete_tag(&repository, &tag).await?;
                    }
                    Ok(DeleteOutcome::Deleted(tag))
                })
                .await?;
            }
        }

        // Phase barrier: a digest must never race its own tag references.
        pool.wait().await?;

        for digest in digests_to_delete {
            self.submit_digest_delete(&pool, &repository, digest, policy.dry_run, &failed, &parked)
                .await?;
        }

        if !policy.dry_run {
            for _ in 0..DANGLING_PARENT_RETRIES {
                pool.wait().await?;
                let retrying = std::mem::take(
                    &mut *parked.lock().unwrap_or_else(PoisonError::into_inner),
                );
                if retrying.is_empty() {
                    break;
                }
                for digest in retrying {
                    self.submit_digest_delete(&pool, &repository, digest, false, &failed, &parked)
                        .await?;
                }
            }
        }

        let results = pool.done().await?;
        let leftover =
            std::mem::take(&mut *parked.lock().unwrap_or_else(PoisonError::into_inner));

        let mut deleted: BTreeSet<String> = BTreeSet::new();
        let mut errors: Vec<EngineError> = Vec::new();

        for outcome in results {
            match outcome {
                Ok(DeleteOutcome::Deleted(reference)) => {
                    deleted.insert(reference);
                }
                Ok(DeleteOutcome::Requeued | DeleteOutcome::Skipped) => {}
                Err(err) => errors.push(err),
            }
        }
        for digest in leftover {
            errors.push(EngineError::DanglingParentExhausted { digest });
        }

        if let Some(err) = EngineError::aggregate(errors) {
            return Err(err);
        }

        Ok(deleted.into_iter().collect())
    }

    /// Expands root repositories recursively via catalog enumeration.
    ///
    /// # Errors
    ///
    /// Returns an error when a registry catalog cannot be listed.
    pub async fn list_child_repositories(&self, roots: &[String]) -> Result<Vec<String>> {
        discovery::expand_repositories(&self.registry, roots, self.concurrency).await
    }

    async fn submit_digest_delete(
        &self,
        pool: &WorkerPool<DeleteOutcome, EngineError>,
        repository: &Repository,
        digest: String,
        dry_run: bool,
        failed: &Arc<AtomicBool>,
        parked: &Arc<Mutex<Vec<String>>>,
    ) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let repository = repository.clone();
        let failed = Arc::clone(failed);
        let parked = Arc::clone(parked);

        pool.submit(async move {
            if dry_run {
                return Ok(DeleteOutcome::Deleted(digest));
            }

            // Once any digest has failed terminally, later tasks skip the
            // transport call entirely. A credentials failure or rate-limit
            // storm then burns one request instead of hundreds.
            if failed.load(Ordering::SeqCst) {
                return Ok(DeleteOutcome::Skipped);
            }

            tracing::debug!(repo = %repository, digest = %digest, "deleting digest");
            match registry.delete_digest(&repository, &digest).await {
                Ok(()) => Ok(DeleteOutcome::Deleted(digest)),
                Err(err) if err.is_dangling_parent() => {
                    tracing::debug!(
                        repo = %repository,
                        digest = %digest,
                        "digest still has live children, parking for retry"
                    );
                    parked
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(digest);
                    Ok(DeleteOutcome::Requeued)
                }
                Err(err) => {
                    failed.store(true, Ordering::SeqCst);
                    Err(EngineError::from(err))
                }
            }
        })
        .await?;

        Ok(())
    }
}

/// Earliest plausible Docker-era creation time (2013-03-20). Build tooling
/// that stamps images with fixed prehistoric creation dates sorts by upload
/// time instead.
fn docker_existence() -> DateTime<Utc> {
    DateTime::from_timestamp(1_363_737_600, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Sorts manifests descending by freshness: by creation time when both
/// timestamps are credible and distinct, by upload time otherwise.
fn sort_by_freshness(manifests: &mut [Manifest]) {
    let epoch = docker_existence();
    manifests.sort_by(|a, b| compare_freshness(a, b, epoch));
}

fn compare_freshness(a: &Manifest, b: &Manifest, epoch: DateTime<Utc>) -> CmpOrdering {
    if a.created() < epoch || b.created() < epoch || a.created() == b.created() {
        b.uploaded().cmp(&a.uploaded())
    } else {
        b.created().cmp(&a.created())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gcrcleaner_registry::ManifestSummary;

    fn manifest(digest: &str, created: DateTime<Utc>, uploaded: DateTime<Utc>) -> Manifest {
        Manifest::new(
            "example.com/app".to_string(),
            digest.to_string(),
            ManifestSummary {
                tags: Vec::new(),
                created,
                uploaded,
            },
        )
    }

    fn digests(manifests: &[Manifest]) -> Vec<&str> {
        manifests.iter().map(|m| m.digest.as_str()).collect()
    }

    #[test]
    fn sorts_by_created_when_credible() {
        let now = Utc::now();
        let mut manifests = vec![
            manifest("sha256:old", now - Duration::days(3), now - Duration::days(1)),
            manifest("sha256:new", now - Duration::days(1), now - Duration::days(3)),
        ];
        sort_by_freshness(&mut manifests);
        assert_eq!(digests(&manifests), vec!["sha256:new", "sha256:old"]);
    }

    #[test]
    fn prehistoric_created_falls_back_to_uploaded() {
        let now = Utc::now();
        let mut manifests = vec![
            manifest("sha256:older", DateTime::UNIX_EPOCH, now - Duration::days(2)),
            manifest("sha256:newer", DateTime::UNIX_EPOCH, now - Duration::days(1)),
        ];
        sort_by_freshness(&mut manifests);
        assert_eq!(digests(&manifests), vec!["sha256:newer", "sha256:older"]);
    }

    #[test]
    fn tied_created_falls_back_to_uploaded() {
        let now = Utc::now();
        let created = now - Duration::days(5);
        let mut manifests = vec![
            manifest("sha256:older", created, now - Duration::days(4)),
            manifest("sha256:newer", created, now - Duration::days(1)),
        ];
        sort_by_freshness(&mut manifests);
        assert_eq!(digests(&manifests), vec!["sha256:newer", "sha256:older"]);
    }

    #[test]
    fn one_prehistoric_side_forces_uploaded_comparison() {
        let now = Utc::now();
        let mut manifests = vec![
            manifest("sha256:a", now - Duration::days(1), now - Duration::days(9)),
            manifest("sha256:b", DateTime::UNIX_EPOCH, now - Duration::days(1)),
        ];
        sort_by_freshness(&mut manifests);
        assert_eq!(digests(&manifests), vec!["sha256:b", "sha256:a"]);
    }
}

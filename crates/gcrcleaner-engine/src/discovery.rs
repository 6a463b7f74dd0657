//! Recursive repository discovery across registries.

use std::collections::BTreeSet;
use std::sync::Arc;

use gcrcleaner_core::worker::WorkerPool;
use gcrcleaner_registry::RegistryClient;

use crate::error::{EngineError, Result};

/// Expands root strings (bare registry hosts or `host/path` prefixes) into
/// the full set of matching repositories.
///
/// Each distinct registry catalog is enumerated in parallel; candidates are
/// qualified as `host/repo` and retained when any root is a prefix of the
/// candidate string. Roots that name a repository themselves are always
/// part of the result. The result is deduplicated and sorted.
///
/// # Errors
///
/// Returns an error when a registry catalog cannot be listed; failures
/// across registries are aggregated.
pub async fn expand_repositories(
    registry: &Arc<dyn RegistryClient>,
    roots: &[String],
    concurrency: usize,
) -> Result<Vec<String>> {
    let mut hosts: BTreeSet<String> = BTreeSet::new();
    let mut repos: BTreeSet<String> = BTreeSet::new();

    for root in roots {
        let root = root.trim();
        if root.is_empty() {
            continue;
        }
        match root.split_once('/') {
            Some((host, path)) if !path.is_empty() => {
                hosts.insert(host.to_string());
                repos.insert(root.to_string());
            }
            _ => {
                hosts.insert(root.trim_end_matches('/').to_string());
            }
        }
    }

    let pool: WorkerPool<Vec<String>, EngineError> = WorkerPool::new(concurrency);
    for host in hosts {
        let registry = Arc::clone(registry);
        pool.submit(async move {
            let listed = registry.catalog(&host).await?;
            Ok(listed
                .into_iter()
                .map(|repo| format!("{host}/{repo}"))
                .collect())
        })
        .await?;
    }

    let results = pool.done().await?;
    let mut errors: Vec<EngineError> = Vec::new();

    for outcome in results {
        match outcome {
            Ok(candidates) => {
                for candidate in candidates {
                    if roots.iter().any(|root| candidate.starts_with(root.trim())) {
                        repos.insert(candidate);
                    }
                }
            }
            Err(err) => errors.push(err),
        }
    }

    if let Some(err) = EngineError::aggregate(errors) {
        return Err(err);
    }

    Ok(repos.into_iter().collect())
}

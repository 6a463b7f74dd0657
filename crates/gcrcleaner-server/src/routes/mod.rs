//! Route handlers and the shared cleaning routine.

pub mod http;
pub mod pubsub;

use std::collections::BTreeMap;

use chrono::Utc;

use gcrcleaner_engine::{EngineError, RetentionPolicy, TagFilter};

use crate::error::ApiError;
use crate::payload::Payload;
use crate::state::AppState;

/// Per-repository outcome of one clean request.
#[derive(Debug, Default)]
pub(crate) struct CleanSummary {
    /// Deleted references per successfully-cleaned repository.
    pub refs_by_repo: BTreeMap<String, Vec<String>>,
    /// Failures per repository; one repository failing never aborts the rest.
    pub errors_by_repo: BTreeMap<String, EngineError>,
}

impl CleanSummary {
    /// Folds all per-repository failures into one service error.
    pub fn aggregate_error(self) -> ApiError {
        EngineError::aggregate(self.errors_by_repo.into_values().collect()).map_or_else(
            || ApiError::Internal {
                message: "clean failed without a recorded error".to_string(),
            },
            ApiError::from,
        )
    }
}

/// Decodes the request into a policy and runs the engine once per
/// repository, collecting per-repository results and failures.
pub(crate) async fn run_clean(state: &AppState, payload: &Payload) -> Result<CleanSummary, ApiError> {
    let repos = payload.normalized_repos();
    if repos.is_empty() {
        return Err(ApiError::bad_request("repos must not be empty"));
    }

    let keep = usize::try_from(payload.keep)
        .map_err(|_| ApiError::bad_request("keep must be non-negative"))?;

    let tag_filter = TagFilter::build(&payload.tag_filter_any, &payload.tag_filter_all)
        .map_err(ApiError::from)?;

    let grace = chrono::Duration::from_std(payload.grace.0)
        .map_err(|_| ApiError::bad_request("grace is out of range"))?;
    let since = Utc::now() - grace;

    let policy = RetentionPolicy {
        since,
        keep,
        tag_filter,
        dry_run: payload.dry_run,
    };

    let repos = if payload.recursive {
        state
            .cleaner
            .list_child_repositories(&repos)
            .await
            .map_err(ApiError::from)?
    } else {
        repos
    };

    let mut summary = CleanSummary::default();
    for repo in repos {
        tracing::info!(repo = %repo, since = %since, dry_run = policy.dry_run, "cleaning repository");
        match state.cleaner.clean(&repo, &policy).await {
            Ok(refs) => {
                tracing::info!(repo = %repo, deleted = refs.len(), "repository cleaned");
                summary.refs_by_repo.insert(repo, refs);
            }
            Err(err) => {
                tracing::warn!(repo = %repo, error = %err, "failed to clean repository");
                summary.errors_by_repo.insert(repo, err);
            }
        }
    }

    Ok(summary)
}

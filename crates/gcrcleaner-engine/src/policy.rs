//! Per-manifest retention decision.

use chrono::{DateTime, Utc};

use crate::filter::TagFilter;
use crate::manifest::Manifest;

/// Per-request retention policy.
///
/// `since` protects anything uploaded after it, unconditionally. Untagged
/// manifests older than `since` are always deletion candidates; the tag
/// filter only widens deletion to tagged manifests. The `keep` allowance is
/// applied by the engine while walking the freshness-sorted list, not here.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Manifests uploaded after this instant are never deleted.
    pub since: DateTime<Utc>,
    /// Number of deletion candidates to protect, freshest first.
    pub keep: usize,
    /// Predicate widening deletion to tagged manifests.
    pub tag_filter: TagFilter,
    /// Report deletions without performing them.
    pub dry_run: bool,
}

impl RetentionPolicy {
    /// Decides whether the manifest is a deletion candidate.
    #[must_use]
    pub fn should_delete(&self, m: &Manifest) -> bool {
        let uploaded = m.uploaded();
        if uploaded > self.since {
            tracing::debug!(
                repo = %m.repo,
                digest = %m.digest,
                reason = "too new",
                since = %self.since,
                uploaded = %uploaded,
                "should not delete"
            );
            return false;
        }

        if m.tags().is_empty() {
            tracing::debug!(
                repo = %m.repo,
                digest = %m.digest,
                reason = "no tags",
                "should delete"
            );
            return true;
        }

        if self.tag_filter.matches(m.tags()) {
            tracing::debug!(
                repo = %m.repo,
                digest = %m.digest,
                reason = "matches tag filter",
                tags = ?m.tags(),
                tag_filter = %self.tag_filter.name(),
                "should delete"
            );
            return true;
        }

        tracing::debug!(
            repo = %m.repo,
            digest = %m.digest,
            reason = "no filter matches",
            "should not delete"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gcrcleaner_registry::ManifestSummary;

    fn manifest(tags: &[&str], uploaded: DateTime<Utc>) -> Manifest {
        Manifest::new(
            "example.com/app".to_string(),
            "sha256:aaa".to_string(),
            ManifestSummary {
                tags: tags.iter().map(ToString::to_string).collect(),
                created: uploaded,
                uploaded,
            },
        )
    }

    fn policy(since: DateTime<Utc>, tag_filter: TagFilter) -> RetentionPolicy {
        RetentionPolicy {
            since,
            keep: 0,
            tag_filter,
            dry_run: false,
        }
    }

    #[test]
    fn uploaded_after_since_is_always_kept() {
        let since = Utc::now() - Duration::hours(24);
        let p = policy(since, TagFilter::build("", ".*").expect("filter"));

        // Even untagged and filter-matching manifests survive when too new.
        assert!(!p.should_delete(&manifest(&[], Utc::now())));
        assert!(!p.should_delete(&manifest(&["v1"], Utc::now())));
    }

    #[test]
    fn old_untagged_is_deleted_regardless_of_filter() {
        let since = Utc::now();
        let old = Utc::now() - Duration::hours(48);

        for filter in [
            TagFilter::Null,
            TagFilter::build("^never-matches$", "").expect("filter"),
        ] {
            let p = policy(since, filter);
            assert!(p.should_delete(&manifest(&[], old)));
        }
    }

    #[test]
    fn old_tagged_needs_a_filter_match() {
        let since = Utc::now();
        let old = Utc::now() - Duration::hours(48);

        let p = policy(since, TagFilter::Null);
        assert!(!p.should_delete(&manifest(&["v1"], old)));

        let p = policy(since, TagFilter::build("^v", "").expect("filter"));
        assert!(p.should_delete(&manifest(&["v1"], old)));

        let p = policy(since, TagFilter::build("", "^dev-").expect("filter"));
        assert!(!p.should_delete(&manifest(&["dev-1", "prod-1"], old)));
    }
}

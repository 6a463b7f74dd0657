//! Tag-filter predicates.

use regex::Regex;

use crate::error::{EngineError, Result};

/// Predicate over the tag set of a manifest.
///
/// Exactly one regex-bearing variant may be configured per request. The
/// null filter rejects every input and stands in when no filter was
/// provided, so callers never juggle an optional filter.
#[derive(Debug, Clone)]
pub enum TagFilter {
    /// Rejects every tag list.
    Null,
    /// True when at least one tag matches.
    Any(Regex),
    /// True when every tag matches (vacuously true on an empty list).
    All(Regex),
}

impl TagFilter {
    /// Compiles a filter from the mutually-exclusive `any`/`all` inputs.
    ///
    /// Both empty yields [`TagFilter::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Filter`] when both inputs are non-empty or a
    /// pattern does not compile.
    pub fn build(any: &str, all: &str) -> Result<Self> {
        if !any.is_empty() && !all.is_empty() {
            return Err(EngineError::Filter {
                message: "only one tag filter type may be specified".to_string(),
            });
        }

        if !any.is_empty() {
            return Ok(Self::Any(compile(any)?));
        }
        if !all.is_empty() {
            return Ok(Self::All(compile(all)?));
        }
        Ok(Self::Null)
    }

    /// Evaluates the predicate against a tag list.
    #[must_use]
    pub fn matches(&self, tags: &[String]) -> bool {
        match self {
            Self::Null => false,
            Self::Any(re) => tags.iter().any(|tag| re.is_match(tag)),
            Self::All(re) => tags.iter().all(|tag| re.is_match(tag)),
        }
    }

    /// Human-readable name used in log lines.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Any(re) => format!("any({re})"),
            Self::All(re) => format!("all({re})"),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| EngineError::Filter {
        message: format!("failed to compile regular expression {pattern:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn both_inputs_set_is_a_construction_error() {
        let err = TagFilter::build("^a", "^b").expect_err("mutually exclusive");
        assert!(matches!(err, EngineError::Filter { .. }));
    }

    #[test]
    fn no_inputs_yields_null() {
        let filter = TagFilter::build("", "").expect("build");
        assert!(matches!(filter, TagFilter::Null));
        assert_eq!(filter.name(), "null");
    }

    #[test]
    fn invalid_pattern_surfaces() {
        assert!(TagFilter::build("(", "").is_err());
        assert!(TagFilter::build("", "(").is_err());
    }

    #[test]
    fn null_rejects_everything() {
        let filter = TagFilter::Null;
        assert!(!filter.matches(&[]));
        assert!(!filter.matches(&tags(&["v1"])));
    }

    #[test]
    fn any_requires_at_least_one_match() {
        let filter = TagFilter::build("^dev-", "").expect("build");
        assert!(!filter.matches(&[]));
        assert!(filter.matches(&tags(&["dev-1", "prod-1"])));
        assert!(!filter.matches(&tags(&["prod-1", "prod-2"])));
    }

    #[test]
    fn all_requires_every_tag_to_match() {
        let filter = TagFilter::build("", "^dev-").expect("build");
        assert!(filter.matches(&tags(&["dev-1", "dev-2"])));
        assert!(!filter.matches(&tags(&["dev-1", "prod-1"])));
        assert!(filter.matches(&[]), "vacuously true on an empty list");
    }

    #[test]
    fn names_carry_the_pattern() {
        assert_eq!(TagFilter::build("^dev-", "").expect("build").name(), "any(^dev-)");
        assert_eq!(TagFilter::build("", "^dev-").expect("build").name(), "all(^dev-)");
    }
}

//! Request and response payloads.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Grace period for new manifests.
///
/// Accepted as integer nanoseconds or a humantime string (`"90s"`, `"3h"`);
/// always rendered back in the humantime form, so parse → emit → parse is
/// idempotent. Negative nanosecond values are folded to their magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grace(pub Duration);

impl Serialize for Grace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(self.0))
    }
}

impl<'de> Deserialize<'de> for Grace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Nanos(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Nanos(nanos) => Ok(Self(Duration::from_nanos(nanos.unsigned_abs()))),
            Raw::Text(text) => humantime::parse_duration(&text)
                .map(Self)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// The clean request body.
///
/// Unknown fields are ignored; `repos` accepts a JSON array of strings or a
/// single string promoted to a singleton.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payload {
    /// Repositories to clean.
    #[serde(default, deserialize_with = "deserialize_repos")]
    pub repos: Vec<String>,
    /// Protection window: manifests younger than this are never deleted.
    #[serde(default)]
    pub grace: Grace,
    /// Deletion candidates to protect, freshest first. Must be >= 0.
    #[serde(default)]
    pub keep: i64,
    /// Regex deleting manifests where any tag matches.
    #[serde(default)]
    pub tag_filter_any: String,
    /// Regex deleting manifests where every tag matches.
    #[serde(default)]
    pub tag_filter_all: String,
    /// Report deletions without performing them.
    #[serde(default)]
    pub dry_run: bool,
    /// Expand each repository recursively via catalog enumeration.
    #[serde(default)]
    pub recursive: bool,
}

impl Payload {
    /// Trimmed, deduplicated repository list (order-insensitive).
    #[must_use]
    pub fn normalized_repos(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .repos
            .iter()
            .map(|repo| repo.trim().to_string())
            .filter(|repo| !repo.is_empty())
            .collect();
        set.into_iter().collect()
    }
}

fn deserialize_repos<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::One(repo) => vec![repo],
        Raw::Many(repos) => repos,
    })
}

/// The clean response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanResponse {
    /// Number of repositories with at least one deletion.
    pub count: usize,
    /// Flattened, deduplicated, sorted list of deleted references.
    pub refs: Vec<String>,
    /// Per-repository deletions.
    pub refs_by_repo: BTreeMap<String, Vec<String>>,
}

impl CleanResponse {
    /// Builds the response views from per-repository results.
    #[must_use]
    pub fn from_refs_by_repo(refs_by_repo: BTreeMap<String, Vec<String>>) -> Self {
        let refs: BTreeSet<String> = refs_by_repo.values().flatten().cloned().collect();
        let count = refs_by_repo
            .values()
            .filter(|refs| !refs.is_empty())
            .count();
        Self {
            count,
            refs: refs.into_iter().collect(),
            refs_by_repo,
        }
    }
}

/// Push-style message-bus envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    /// Subscription the message was delivered on.
    pub subscription: String,
    /// The wrapped message.
    pub message: PushMessage,
}

/// The message inside a [`PushEnvelope`].
#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    /// Base64-encoded [`Payload`] JSON.
    #[serde(default)]
    pub data: String,
    /// Bus-assigned message identifier.
    pub message_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_accepts_duration_strings() {
        let payload: Payload = serde_json::from_str(r#"{"repos":["a.io/x"],"grace":"3h"}"#)
            .expect("parse");
        assert_eq!(payload.grace, Grace(Duration::from_secs(3 * 3600)));
    }

    #[test]
    fn grace_accepts_nanoseconds() {
        let payload: Payload =
            serde_json::from_str(r#"{"repos":["a.io/x"],"grace":10800000000000}"#).expect("parse");
        assert_eq!(payload.grace, Grace(Duration::from_secs(3 * 3600)));

        let negative: Payload =
            serde_json::from_str(r#"{"repos":["a.io/x"],"grace":-10800000000000}"#)
                .expect("parse");
        assert_eq!(negative.grace, Grace(Duration::from_secs(3 * 3600)));
    }

    #[test]
    fn grace_round_trips_through_the_string_form() {
        let original = Grace(Duration::from_secs(3 * 3600));
        let emitted = serde_json::to_string(&original).expect("emit");
        assert_eq!(emitted, "\"3h\"");
        let reparsed: Grace = serde_json::from_str(&emitted).expect("reparse");
        assert_eq!(reparsed, original);
    }

    #[test]
    fn single_string_repos_is_promoted() {
        let payload: Payload = serde_json::from_str(r#"{"repos":"a.io/x"}"#).expect("parse");
        assert_eq!(payload.repos, vec!["a.io/x"]);
    }

    #[test]
    fn repos_normalization_is_idempotent() {
        let payload: Payload =
            serde_json::from_str(r#"{"repos":[" a.io/x ","a.io/y","a.io/x",""]}"#).expect("parse");
        let normalized = payload.normalized_repos();
        assert_eq!(normalized, vec!["a.io/x", "a.io/y"]);

        let again = Payload {
            repos: normalized.clone(),
            ..Payload::default()
        };
        assert_eq!(again.normalized_repos(), normalized);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let payload: Payload =
            serde_json::from_str(r#"{"repos":["a.io/x"],"surprise":true}"#).expect("parse");
        assert_eq!(payload.repos, vec!["a.io/x"]);
    }

    #[test]
    fn response_views_are_consistent() {
        let mut refs_by_repo = BTreeMap::new();
        refs_by_repo.insert(
            "a.io/x".to_string(),
            vec!["sha256:a".to_string(), "sha256:b".to_string()],
        );
        refs_by_repo.insert("a.io/y".to_string(), vec!["sha256:b".to_string()]);
        refs_by_repo.insert("a.io/z".to_string(), Vec::new());

        let response = CleanResponse::from_refs_by_repo(refs_by_repo);
        assert_eq!(response.count, 2);
        assert_eq!(response.refs, vec!["sha256:a", "sha256:b"]);
    }

    #[test]
    fn envelope_parses_bus_shape() {
        let envelope: PushEnvelope = serde_json::from_str(
            r#"{"subscription":"projects/p/subscriptions/s","message":{"data":"e30=","message_id":"m1"}}"#,
        )
        .expect("parse");
        assert_eq!(envelope.subscription, "projects/p/subscriptions/s");
        assert_eq!(envelope.message.message_id, "m1");
    }
}

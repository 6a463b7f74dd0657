//! Service behavior tests over the full router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use tower::ServiceExt;

use gcrcleaner_core::cache::{DedupCache, TimerCache};
use gcrcleaner_engine::Cleaner;
use gcrcleaner_registry::{ManifestSummary, MemoryRegistry, RegistryClient};
use gcrcleaner_server::{AppState, CleanResponse, ErrorResponse, service_router};

const REPO: &str = "example.com/team/app";

fn app_for(registry: &Arc<MemoryRegistry>) -> Router {
    let registry_dyn: Arc<dyn RegistryClient> = Arc::clone(registry) as Arc<dyn RegistryClient>;
    let cleaner = Arc::new(Cleaner::new(registry_dyn, 4));
    let cache: Arc<dyn DedupCache> = Arc::new(TimerCache::new(Duration::from_secs(60)));
    service_router(AppState::new(cleaner, cache))
}

fn seeded_registry() -> Arc<MemoryRegistry> {
    let registry = Arc::new(MemoryRegistry::new());
    let now = Utc::now();
    registry.insert_manifest(
        REPO,
        "sha256:stale",
        ManifestSummary {
            tags: Vec::new(),
            created: DateTime::UNIX_EPOCH,
            uploaded: now - chrono::Duration::hours(48),
        },
    );
    registry.insert_manifest(
        REPO,
        "sha256:fresh",
        ManifestSummary {
            tags: Vec::new(),
            created: DateTime::UNIX_EPOCH,
            uploaded: now,
        },
    );
    registry
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_of(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

#[tokio::test]
async fn http_cleans_and_reports_both_views() {
    let registry = seeded_registry();
    let app = app_for(&registry);

    let response = app
        .oneshot(post_json(
            "/http",
            &format!(r#"{{"repos":["{REPO}"],"grace":"24h"}}"#),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body: CleanResponse = serde_json::from_slice(&body_of(response).await).expect("json");
    assert_eq!(body.count, 1);
    assert_eq!(body.refs, vec!["sha256:stale"]);
    assert_eq!(body.refs_by_repo[REPO], vec!["sha256:stale"]);
}

#[tokio::test]
async fn http_accepts_a_single_string_repo() {
    let registry = seeded_registry();
    let app = app_for(&registry);

    let response = app
        .oneshot(post_json(
            "/http",
            &format!(r#"{{"repos":"{REPO}","grace":"24h"}}"#),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn http_rejects_empty_repos() {
    let registry = seeded_registry();
    let app = app_for(&registry);

    let response = app
        .oneshot(post_json("/http", r#"{"repos":[]}"#))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = serde_json::from_slice(&body_of(response).await).expect("json");
    assert!(body.error.contains("repos"));
}

#[tokio::test]
async fn http_rejects_conflicting_filters() {
    let registry = seeded_registry();
    let app = app_for(&registry);

    let response = app
        .oneshot(post_json(
            "/http",
            &format!(
                r#"{{"repos":["{REPO}"],"tag_filter_any":"^a","tag_filter_all":"^b"}}"#
            ),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_rejects_malformed_json_and_negative_keep() {
    let registry = seeded_registry();

    let response = app_for(&registry)
        .oneshot(post_json("/http", "{not json"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app_for(&registry)
        .oneshot(post_json("/http", &format!(r#"{{"repos":["{REPO}"],"keep":-1}}"#)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_fails_when_every_repository_fails() {
    let registry = Arc::new(MemoryRegistry::new());
    let app = app_for(&registry);

    let response = app
        .oneshot(post_json("/http", r#"{"repos":["example.com/missing"]}"#))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = serde_json::from_slice(&body_of(response).await).expect("json");
    assert!(body.error.contains("repository not found"));
}

#[tokio::test]
async fn http_partial_failure_still_reports_successes() {
    let registry = seeded_registry();
    let app = app_for(&registry);

    let response = app
        .oneshot(post_json(
            "/http",
            &format!(r#"{{"repos":["{REPO}","example.com/missing"],"grace":"24h"}}"#),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body: CleanResponse = serde_json::from_slice(&body_of(response).await).expect("json");
    assert_eq!(body.refs, vec!["sha256:stale"]);
    assert!(!body.refs_by_repo.contains_key("example.com/missing"));
}

#[tokio::test]
async fn pubsub_acknowledges_and_cleans_once() {
    let registry = seeded_registry();
    let app = app_for(&registry);

    let payload = format!(r#"{{"repos":["{REPO}"],"grace":"24h"}}"#);
    let envelope = format!(
        r#"{{"subscription":"projects/p/subscriptions/s","message":{{"data":"{}","message_id":"m1"}}}}"#,
        BASE64.encode(payload.as_bytes())
    );

    let first = app
        .clone()
        .oneshot(post_json("/pubsub", &envelope))
        .await
        .expect("response");
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let second = app
        .oneshot(post_json("/pubsub", &envelope))
        .await
        .expect("response");
    assert_eq!(second.status(), StatusCode::NO_CONTENT);

    // Let the detached clean finish, then verify it ran exactly once.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(registry.deletions(), vec!["sha256:stale"]);
}

#[tokio::test]
async fn pubsub_rejects_malformed_envelopes() {
    let registry = seeded_registry();

    let response = app_for(&registry)
        .oneshot(post_json("/pubsub", "{not json"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app_for(&registry)
        .oneshot(post_json(
            "/pubsub",
            r#"{"subscription":"s","message":{"data":"","message_id":"m2"}}"#,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_answers_ok() {
    let registry = seeded_registry();
    let response = app_for(&registry)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

//! Docker-v2 HTTP client with the GCR manifest-listing extension.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::client::{ManifestSummary, RegistryClient};
use crate::error::{RegistryError, Result};
use crate::keychain::{Credential, Keychain};
use crate::name::Repository;

/// Page size for catalog enumeration.
const CATALOG_PAGE_SIZE: usize = 1000;

/// [`RegistryClient`] implementation speaking HTTPS to real registries.
///
/// Listing relies on the GCR extension to `/v2/{repo}/tags/list` that
/// returns a `manifest` map with per-digest tags and timestamps; deletion
/// and catalog enumeration are plain Docker-v2.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    keychain: Arc<dyn Keychain>,
}

#[derive(Debug, Deserialize)]
struct TagsListResponse {
    #[serde(default)]
    manifest: HashMap<String, RawManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default)]
    tag: Vec<String>,
    #[serde(default)]
    time_created_ms: String,
    #[serde(default)]
    time_uploaded_ms: String,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Vec<String>,
}

impl HttpRegistryClient {
    /// Creates a client resolving credentials through the given keychain.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(keychain: Arc<dyn Keychain>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RegistryError::Transport {
                context: "client construction".to_string(),
                source: e,
            })?;

        Ok(Self { client, keychain })
    }

    async fn authorize(
        &self,
        registry: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        match self.keychain.resolve(registry).await? {
            Some(Credential::Bearer(token)) => Ok(request.bearer_auth(token)),
            Some(Credential::Basic { username, password }) => {
                Ok(request.basic_auth(username, Some(password)))
            }
            None => Ok(request),
        }
    }

    async fn execute(&self, registry: &str, url: &str) -> Result<reqwest::Response> {
        let request = self.client.get(url);
        let request = self.authorize(registry, request).await?;
        let response = request.send().await.map_err(|e| RegistryError::Transport {
            context: url.to_string(),
            source: e,
        })?;
        check_status(url, response).await
    }
}

async fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RegistryError::Api {
        status: status.as_u16(),
        context: url.to_string(),
        message,
    })
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn list_manifests(
        &self,
        repo: &Repository,
    ) -> Result<BTreeMap<String, ManifestSummary>> {
        let url = format!("https://{}/v2/{}/tags/list", repo.registry(), repo.repo());
        let response = self.execute(repo.registry(), &url).await?;
        let listed: TagsListResponse =
            response.json().await.map_err(|e| RegistryError::Transport {
                context: url.clone(),
                source: e,
            })?;

        Ok(listed
            .manifest
            .into_iter()
            .map(|(digest, raw)| {
                let summary = ManifestSummary {
                    tags: raw.tag,
                    created: parse_millis(&raw.time_created_ms),
                    uploaded: parse_millis(&raw.time_uploaded_ms),
                };
                (digest, summary)
            })
            .collect())
    }

    async fn delete_tag(&self, repo: &Repository, tag: &str) -> Result<()> {
        delete_reference(self, repo, tag).await
    }

    async fn delete_digest(&self, repo: &Repository, digest: &str) -> Result<()> {
        delete_reference(self, repo, digest).await
    }

    async fn catalog(&self, registry: &str) -> Result<Vec<String>> {
        let mut repositories = Vec::new();
        let mut last: Option<String> = None;

        loop {
            let url = match &last {
                Some(cursor) => format!(
                    "https://{registry}/v2/_catalog?n={CATALOG_PAGE_SIZE}&last={cursor}"
                ),
                None => format!("https://{registry}/v2/_catalog?n={CATALOG_PAGE_SIZE}"),
            };
            let response = self.execute(registry, &url).await?;
            let page: CatalogResponse =
                response.json().await.map_err(|e| RegistryError::Transport {
                    context: url.clone(),
                    source: e,
                })?;

            let full_page = page.repositories.len() == CATALOG_PAGE_SIZE;
            last = page.repositories.last().cloned();
            repositories.extend(page.repositories);

            if !full_page || last.is_none() {
                break;
            }
        }

        Ok(repositories)
    }
}

async fn delete_reference(
    client: &HttpRegistryClient,
    repo: &Repository,
    reference: &str,
) -> Result<()> {
    let url = format!(
        "https://{}/v2/{}/manifests/{reference}",
        repo.registry(),
        repo.repo()
    );
    let request = client.client.delete(&url);
    let request = client.authorize(repo.registry(), request).await?;
    let response = request.send().await.map_err(|e| RegistryError::Transport {
        context: url.clone(),
        source: e,
    })?;
    check_status(&url, response).await?;
    Ok(())
}

/// Parses an epoch-milliseconds string; anything unparseable maps to the
/// epoch, which the engine's freshness sort already treats as prehistoric.
fn parse_millis(value: &str) -> DateTime<Utc> {
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gcr_tags_list_payload() {
        let payload = r#"{
            "child": [],
            "manifest": {
                "sha256:aaa": {
                    "imageSizeBytes": "12345",
                    "tag": ["latest", "v1"],
                    "timeCreatedMs": "1629820163000",
                    "timeUploadedMs": "1629820164000"
                },
                "sha256:bbb": {
                    "tag": [],
                    "timeCreatedMs": "0",
                    "timeUploadedMs": "1629820165000"
                }
            },
            "name": "project/image",
            "tags": ["latest", "v1"]
        }"#;

        let listed: TagsListResponse = serde_json::from_str(payload).expect("parse");
        assert_eq!(listed.manifest.len(), 2);

        let aaa = &listed.manifest["sha256:aaa"];
        assert_eq!(aaa.tag, vec!["latest", "v1"]);
        assert_eq!(
            parse_millis(&aaa.time_uploaded_ms).timestamp_millis(),
            1_629_820_164_000
        );
    }

    #[test]
    fn unparseable_timestamps_map_to_epoch() {
        assert_eq!(parse_millis(""), DateTime::UNIX_EPOCH);
        assert_eq!(parse_millis("not-a-number"), DateTime::UNIX_EPOCH);
    }
}

//! Credential resolution for registry requests.
//!
//! Resolution precedence is: explicitly-configured bearer token, ambient
//! cloud credentials (instance metadata), local docker config. A keychain
//! that has nothing for a registry answers `None`; requests then go out
//! anonymously.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::error::{RegistryError, Result};

/// A resolved credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// OAuth2 / registry bearer token.
    Bearer(String),
    /// Username and password pair.
    Basic {
        /// Account name.
        username: String,
        /// Account secret.
        password: String,
    },
}

/// Resolves credentials per registry host.
#[async_trait]
pub trait Keychain: Send + Sync {
    /// Resolves a credential for the registry, or `None` when anonymous.
    async fn resolve(&self, registry: &str) -> Result<Option<Credential>>;
}

/// Keychain backed by a single pre-shared bearer token.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Creates a keychain that answers with the given token for every host.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Keychain for StaticToken {
    async fn resolve(&self, _registry: &str) -> Result<Option<Credential>> {
        if self.token.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential::Bearer(self.token.clone())))
    }
}

/// Keychain resolving ambient cloud credentials from the GCE instance
/// metadata service. Off-cloud the service is unreachable and this keychain
/// silently yields nothing.
pub struct MetadataServer {
    client: reqwest::Client,
    endpoint: String,
}

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl MetadataServer {
    /// Creates a metadata-server keychain with a short probe timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .map_err(|e| RegistryError::Transport {
                context: "metadata client construction".to_string(),
                source: e,
            })?;
        Ok(Self {
            client,
            endpoint: METADATA_TOKEN_URL.to_string(),
        })
    }

    /// Overrides the metadata endpoint (tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Keychain for MetadataServer {
    async fn resolve(&self, registry: &str) -> Result<Option<Credential>> {
        let response = match self
            .client
            .get(&self.endpoint)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(registry, error = %e, "instance metadata unreachable");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            tracing::debug!(registry, status = %response.status(), "instance metadata refused token request");
            return Ok(None);
        }

        let token: MetadataToken =
            response
                .json()
                .await
                .map_err(|e| RegistryError::Transport {
                    context: "metadata token response".to_string(),
                    source: e,
                })?;

        if token.access_token.is_empty() {
            return Err(RegistryError::Auth {
                message: "metadata server returned an empty access token".to_string(),
            });
        }

        Ok(Some(Credential::Bearer(token.access_token)))
    }
}

/// Keychain reading `auths` entries from a local docker `config.json`.
pub struct DockerConfig {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Deserialize)]
struct DockerAuth {
    #[serde(default)]
    auth: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl DockerConfig {
    /// Creates a keychain reading `$DOCKER_CONFIG/config.json`, falling back
    /// to `$HOME/.docker/config.json`.
    #[must_use]
    pub fn new() -> Self {
        let path = std::env::var_os("DOCKER_CONFIG")
            .map(|dir| PathBuf::from(dir).join("config.json"))
            .or_else(|| {
                std::env::var_os("HOME")
                    .map(|home| PathBuf::from(home).join(".docker").join("config.json"))
            });
        Self { path }
    }

    /// Creates a keychain reading the given config file (tests).
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn lookup(&self, registry: &str) -> Result<Option<Credential>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Ok(None);
        };

        let config: DockerConfigFile =
            serde_json::from_str(&contents).map_err(|e| RegistryError::Auth {
                message: format!("failed to parse {}: {e}", path.display()),
            })?;

        let Some(entry) = config
            .auths
            .get(registry)
            .or_else(|| config.auths.get(&format!("https://{registry}")))
        else {
            return Ok(None);
        };

        if !entry.username.is_empty() {
            return Ok(Some(Credential::Basic {
                username: entry.username.clone(),
                password: entry.password.clone(),
            }));
        }
        if entry.auth.is_empty() {
            return Ok(None);
        }

        let decoded = BASE64
            .decode(entry.auth.as_bytes())
            .map_err(|e| RegistryError::Auth {
                message: format!("invalid auth entry for {registry}: {e}"),
            })?;
        let decoded = String::from_utf8(decoded).map_err(|e| RegistryError::Auth {
            message: format!("invalid auth entry for {registry}: {e}"),
        })?;
        let Some((username, password)) = decoded.split_once(':') else {
            return Err(RegistryError::Auth {
                message: format!("auth entry for {registry} is not user:password"),
            });
        };

        Ok(Some(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }))
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Keychain for DockerConfig {
    async fn resolve(&self, registry: &str) -> Result<Option<Credential>> {
        self.lookup(registry)
    }
}

/// Keychain trying a list of keychains in order; the first hit wins.
#[derive(Default)]
pub struct ChainKeychain {
    chain: Vec<Box<dyn Keychain>>,
}

impl ChainKeychain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a keychain to the end of the chain.
    #[must_use]
    pub fn with(mut self, keychain: impl Keychain + 'static) -> Self {
        self.chain.push(Box::new(keychain));
        self
    }
}

#[async_trait]
impl Keychain for ChainKeychain {
    async fn resolve(&self, registry: &str) -> Result<Option<Credential>> {
        for keychain in &self.chain {
            if let Some(credential) = keychain.resolve(registry).await? {
                return Ok(Some(credential));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[tokio::test]
    async fn static_token_resolves_bearer() {
        let keychain = StaticToken::new("tok-123");
        let credential = keychain.resolve("gcr.io").await.expect("resolve");
        assert_eq!(credential, Some(Credential::Bearer("tok-123".to_string())));
    }

    #[tokio::test]
    async fn empty_static_token_is_anonymous() {
        let keychain = StaticToken::new("");
        assert_eq!(keychain.resolve("gcr.io").await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn docker_config_decodes_auth_entry() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        let auth = BASE64.encode("alice:s3cret");
        write!(file, "{{\"auths\":{{\"registry.example.com\":{{\"auth\":\"{auth}\"}}}}}}")
            .expect("write");

        let keychain = DockerConfig::at_path(file.path());
        let credential = keychain
            .resolve("registry.example.com")
            .await
            .expect("resolve");
        assert_eq!(
            credential,
            Some(Credential::Basic {
                username: "alice".to_string(),
                password: "s3cret".to_string(),
            })
        );

        assert_eq!(keychain.resolve("other.example.com").await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn docker_config_missing_file_is_anonymous() {
        let keychain = DockerConfig::at_path("/nonexistent/config.json");
        assert_eq!(keychain.resolve("gcr.io").await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn chain_prefers_earlier_keychains() {
        let chain = ChainKeychain::new()
            .with(StaticToken::new(""))
            .with(StaticToken::new("from-chain"));
        let credential = chain.resolve("gcr.io").await.expect("resolve");
        assert_eq!(credential, Some(Credential::Bearer("from-chain".to_string())));
    }
}

//! OCI registry backend
//!
//! Pulls a single-file artifact over the OCI distribution API: resolve the
//! reference to a manifest, take its first layer descriptor and download that
//! blob. Registries that answer `401` with a `Bearer` challenge get one token
//! request, authenticated with basic credentials when configured.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::fetcher::Fetcher;
use crate::{Error, Location, Result};

pub const REGISTRY_USERNAME_ENV: &str = "TMPL_REGISTRY_USERNAME";
pub const REGISTRY_PASSWORD_ENV: &str = "TMPL_REGISTRY_PASSWORD";
pub const REGISTRY_PLAIN_HTTP_ENV: &str = "TMPL_REGISTRY_PLAIN_HTTP";

const DOCKER_HUB: &str = "registry-1.docker.io";
const DEFAULT_TAG: &str = "latest";

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json";

/// Registry connection settings
#[derive(Debug, Clone, Default)]
pub struct OciFetcherConfig {
    /// Talk plain HTTP instead of HTTPS (local registries)
    pub plain_http: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl OciFetcherConfig {
    /// Read settings from the `TMPL_REGISTRY_*` environment variables
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let plain_http = var(REGISTRY_PLAIN_HTTP_ENV)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        let (username, password) = match (var(REGISTRY_USERNAME_ENV), var(REGISTRY_PASSWORD_ENV)) {
            (Some(username), Some(password)) => (Some(username), Some(password)),
            _ => (None, None),
        };

        Self {
            plain_http,
            username,
            password,
        }
    }

    fn basic_credentials(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.password.as_deref()?))
    }
}

/// A parsed `registry/repository[:tag|@digest]` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryReference {
    pub registry: String,
    pub repository: String,
    /// Tag or digest
    pub target: String,
}

impl RegistryReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidReference {
            reference: reference.to_string(),
            message: message.to_string(),
        };

        let (name, target) = match reference.split_once('@') {
            Some((name, digest)) => (name, digest),
            None => match reference.rfind(':') {
                Some(idx) if !reference[idx + 1..].contains('/') => {
                    (&reference[..idx], &reference[idx + 1..])
                }
                _ => (reference, DEFAULT_TAG),
            },
        };

        if name.is_empty() {
            return Err(invalid("missing repository name"));
        }
        if target.is_empty() {
            return Err(invalid("empty tag or digest"));
        }

        let (registry, repository) = match name.split_once('/') {
            Some((host, rest)) if host.contains(['.', ':']) || host == "localhost" => {
                (host.to_string(), rest.to_string())
            }
            Some(_) => (DOCKER_HUB.to_string(), name.to_string()),
            None => (DOCKER_HUB.to_string(), format!("library/{name}")),
        };

        if repository.is_empty() {
            return Err(invalid("missing repository name"));
        }

        Ok(Self {
            registry,
            repository,
            target: target.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    layers: Vec<Descriptor>,
    #[serde(default)]
    manifests: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
enum Auth {
    Anonymous,
    Bearer(String),
    Basic,
}

/// Fetches single-layer artifacts from OCI registries
#[derive(Debug, Clone)]
pub struct OciFetcher {
    config: OciFetcherConfig,
    client: reqwest::Client,
}

impl OciFetcher {
    pub fn new(config: OciFetcherConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn base_url(&self, reference: &RegistryReference) -> String {
        let scheme = if self.config.plain_http { "http" } else { "https" };
        format!("{scheme}://{}/v2/{}", reference.registry, reference.repository)
    }

    async fn pull(&self, raw: &str) -> Result<Vec<u8>> {
        let reference = RegistryReference::parse(raw)?;
        let base = self.base_url(&reference);
        let mut auth = Auth::Anonymous;

        let manifest_url = format!("{base}/manifests/{}", reference.target);
        let response = self
            .get(raw, &reference, &manifest_url, MANIFEST_ACCEPT, &mut auth)
            .await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::registry(raw, e))?;
        let manifest: Manifest = serde_json::from_slice(&body)
            .map_err(|e| Error::registry(raw, format!("invalid manifest: {e}")))?;

        let Some(layer) = manifest.layers.first() else {
            let message = if manifest.manifests.is_empty() {
                "manifest has no layers"
            } else {
                "reference resolves to an index, not a single artifact"
            };
            return Err(Error::registry(raw, message));
        };
        tracing::debug!(reference = raw, digest = %layer.digest, "Resolved registry artifact");

        let blob_url = format!("{base}/blobs/{}", layer.digest);
        let response = self.get(raw, &reference, &blob_url, "*/*", &mut auth).await?;
        let blob = response
            .bytes()
            .await
            .map_err(|e| Error::registry(raw, e))?;

        verify_digest(raw, &layer.digest, &blob)?;
        Ok(blob.to_vec())
    }

    async fn get(
        &self,
        raw: &str,
        reference: &RegistryReference,
        url: &str,
        accept: &str,
        auth: &mut Auth,
    ) -> Result<reqwest::Response> {
        let response = self.send(raw, url, accept, auth).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !matches!(auth, Auth::Anonymous) {
            return check_status(raw, response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        *auth = self.authenticate(raw, reference, &challenge).await?;

        let retried = self.send(raw, url, accept, auth).await?;
        check_status(raw, retried)
    }

    async fn send(&self, raw: &str, url: &str, accept: &str, auth: &Auth) -> Result<reqwest::Response> {
        let mut request = self.client.get(url).header(ACCEPT, accept);
        match auth {
            Auth::Anonymous => {}
            Auth::Bearer(token) => request = request.bearer_auth(token),
            Auth::Basic => {
                if let Some((username, password)) = self.config.basic_credentials() {
                    request = request.basic_auth(username, Some(password));
                }
            }
        }
        request.send().await.map_err(|e| Error::registry(raw, e))
    }

    async fn authenticate(
        &self,
        raw: &str,
        reference: &RegistryReference,
        challenge: &str,
    ) -> Result<Auth> {
        let (scheme, params) = challenge.split_once(' ').unwrap_or((challenge, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            if self.config.basic_credentials().is_none() {
                return Err(Error::registry(raw, "registry requires credentials"));
            }
            return Ok(Auth::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(Error::registry(
                raw,
                format!("unsupported authentication challenge '{challenge}'"),
            ));
        }

        let params = parse_challenge_params(params);
        let realm = params
            .get("realm")
            .ok_or_else(|| Error::registry(raw, "bearer challenge without realm"))?;
        let scope = params
            .get("scope")
            .cloned()
            .unwrap_or_else(|| format!("repository:{}:pull", reference.repository));

        let mut query = vec![("scope", scope.as_str())];
        if let Some(service) = params.get("service") {
            query.push(("service", service.as_str()));
        }

        let mut request = self.client.get(realm).query(&query);
        if let Some((username, password)) = self.config.basic_credentials() {
            request = request.basic_auth(username, Some(password));
        }

        tracing::debug!(reference = raw, %realm, "Requesting registry token");
        let response = request.send().await.map_err(|e| Error::registry(raw, e))?;
        let response = check_status(raw, response)?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::registry(raw, format!("invalid token response: {e}")))?;

        token
            .token
            .or(token.access_token)
            .map(Auth::Bearer)
            .ok_or_else(|| Error::registry(raw, "token response did not contain a token"))
    }
}

impl Default for OciFetcher {
    fn default() -> Self {
        Self::new(OciFetcherConfig::default())
    }
}

#[async_trait]
impl Fetcher for OciFetcher {
    async fn fetch(&self, cancel: &CancellationToken, location: &Location) -> Result<Vec<u8>> {
        let Location::Registry { reference } = location else {
            return Err(Error::Unsupported {
                backend: "oci",
                location: location.to_string(),
            });
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled {
                location: location.to_string(),
            }),
            result = self.pull(reference) => result,
        }
    }
}

fn check_status(raw: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::registry(
            raw,
            format!("{} returned {status}", response.url()),
        ))
    }
}

fn verify_digest(raw: &str, expected: &str, blob: &[u8]) -> Result<()> {
    let Some(hex_digest) = expected.strip_prefix("sha256:") else {
        tracing::debug!(digest = expected, "Skipping verification of non-sha256 digest");
        return Ok(());
    };
    let actual = hex::encode(Sha256::digest(blob));
    if actual.eq_ignore_ascii_case(hex_digest) {
        Ok(())
    } else {
        Err(Error::Digest {
            reference: raw.to_string(),
            expected: expected.to_string(),
            actual: format!("sha256:{actual}"),
        })
    }
}

/// Parse `key="value",key=value` pairs from a `WWW-Authenticate` header.
fn parse_challenge_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while let Some((key, after)) = rest.split_once('=') {
        let key = key.trim().to_ascii_lowercase();
        let (value, remainder) = match after.strip_prefix('"') {
            Some(quoted) => quoted.split_once('"').unwrap_or((quoted, "")),
            None => after.split_once(',').unwrap_or((after, "")),
        };
        params.insert(key, value.trim().to_string());
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

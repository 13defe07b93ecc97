// src/discovery.rs

use crate::error::OidcRpError;
use crate::validator::config::{ClientConfig, ProviderSource};
use moka::future::Cache;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

/// Represents the data structure of an OIDC provider's discovery document.
/// Found at the `.well-known/openid-configuration` endpoint.
///
/// Every field is optional here so that a missing one can be reported by name.
#[derive(Debug, Deserialize)]
pub struct OidcDiscoveryDocument {
    pub issuer: Option<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub jwks_uri: Option<String>,
}

/// The provider facts the relying party depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub jwks_uri: Url,
}

impl ProviderMetadata {
    /// Builds metadata from already-known values, checking that none is empty
    /// and every endpoint is an absolute URL.
    pub fn new(
        issuer: &str,
        authorization_endpoint: &str,
        token_endpoint: &str,
        jwks_uri: &str,
    ) -> Result<Self, OidcRpError> {
        if issuer.is_empty() {
            return Err(OidcRpError::Discovery("'issuer' is empty".to_string()));
        }
        Ok(Self {
            issuer: issuer.to_string(),
            authorization_endpoint: absolute_url("authorization_endpoint", authorization_endpoint)?,
            token_endpoint: absolute_url("token_endpoint", token_endpoint)?,
            jwks_uri: absolute_url("jwks_uri", jwks_uri)?,
        })
    }
}

impl TryFrom<OidcDiscoveryDocument> for ProviderMetadata {
    type Error = OidcRpError;

    fn try_from(doc: OidcDiscoveryDocument) -> Result<Self, Self::Error> {
        let required = |field: &str, value: Option<String>| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| OidcRpError::Discovery(format!("missing required field '{field}'")))
        };
        let issuer = required("issuer", doc.issuer)?;
        let authorization_endpoint = required("authorization_endpoint", doc.authorization_endpoint)?;
        let token_endpoint = required("token_endpoint", doc.token_endpoint)?;
        let jwks_uri = required("jwks_uri", doc.jwks_uri)?;
        Self::new(&issuer, &authorization_endpoint, &token_endpoint, &jwks_uri)
    }
}

fn absolute_url(field: &str, value: &str) -> Result<Url, OidcRpError> {
    let url = Url::parse(value)
        .map_err(|e| OidcRpError::Discovery(format!("'{field}' is not an absolute URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(OidcRpError::Discovery(format!(
            "'{field}' is not a hierarchical URL"
        )));
    }
    Ok(url)
}

/// Resolves and caches provider metadata, keyed by discovery URL.
///
/// Concurrent first-time resolutions of the same URL share one request.
/// Failures are not cached.
#[derive(Clone)]
pub struct MetadataResolver {
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    cache: Cache<Url, Arc<ProviderMetadata>>,
}

impl MetadataResolver {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                http_client,
                cache: Cache::new(16),
            }),
        }
    }

    /// Returns the metadata for `discovery_url`, fetching it on first use.
    #[instrument(skip(self), fields(discovery_url = %discovery_url), err)]
    pub async fn resolve(&self, discovery_url: &Url) -> Result<Arc<ProviderMetadata>, OidcRpError> {
        let http_client = self.inner.http_client.clone();
        let url = discovery_url.clone();
        self.inner
            .cache
            .try_get_with(discovery_url.clone(), async move {
                fetch_metadata(&http_client, &url).await.map(Arc::new)
            })
            .await
            .map_err(|shared| {
                Arc::try_unwrap(shared).unwrap_or_else(|e| OidcRpError::Discovery(e.to_string()))
            })
    }

    /// Resolves metadata for a client, honouring static endpoints and the issuer pin.
    pub async fn resolve_for(&self, config: &ClientConfig) -> Result<Arc<ProviderMetadata>, OidcRpError> {
        let metadata = match &config.provider {
            ProviderSource::Discovery(url) => self.resolve(url).await?,
            ProviderSource::Static {
                issuer,
                authorization_endpoint,
                token_endpoint,
                jwks_endpoint,
            } => Arc::new(ProviderMetadata::new(
                issuer,
                authorization_endpoint.as_str(),
                token_endpoint.as_str(),
                jwks_endpoint.as_str(),
            )?),
        };

        if let Some(pinned) = &config.issuer {
            if *pinned != metadata.issuer {
                return Err(OidcRpError::Discovery(format!(
                    "provider reports issuer '{}', configured issuer is '{}'",
                    metadata.issuer, pinned
                )));
            }
        }
        Ok(metadata)
    }
}

async fn fetch_metadata(http_client: &reqwest::Client, url: &Url) -> Result<ProviderMetadata, OidcRpError> {
    debug!("Performing OIDC discovery at: {}", url);
    let response = http_client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| OidcRpError::Discovery(format!("request failed: {e}")))?;
    if !response.status().is_success() {
        return Err(OidcRpError::Discovery(format!(
            "discovery endpoint returned {}",
            response.status()
        )));
    }
    let doc: OidcDiscoveryDocument = response
        .json()
        .await
        .map_err(|e| OidcRpError::Discovery(format!("malformed discovery document: {e}")))?;
    let metadata = ProviderMetadata::try_from(doc)?;
    info!(issuer = %metadata.issuer, "Resolved OIDC provider metadata");
    Ok(metadata)
}

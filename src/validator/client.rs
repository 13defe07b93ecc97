// src/validator/client.rs

use super::keys::KeyResolver;
use super::model::{JsonWebKey, JsonWebKeySet};
use crate::error::OidcRpError;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const FORCED_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// A client for fetching and caching the provider's JSON Web Key Set.
///
/// The whole set is cached under its `jwks_uri`. Concurrent lookups that miss
/// the cache share a single in-flight fetch. When a `kid` is absent from a
/// cached set, the set is refetched once to pick up rotated keys.
#[derive(Clone)]
pub struct JwksClient {
    // The client is internally ref-counted to allow for cheap cloning.
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    jwks_uri: Url,
    key_sets: Cache<Url, Arc<JsonWebKeySet>>,
    // Bounds how often an unknown `kid` can force a refetch.
    last_forced_refresh: Mutex<Option<Instant>>,
}

impl JwksClient {
    /// Creates a new `JwksClient` with the default one hour cache TTL.
    pub fn new(http_client: reqwest::Client, jwks_uri: Url) -> Self {
        Self::with_cache_ttl(http_client, jwks_uri, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(http_client: reqwest::Client, jwks_uri: Url, cache_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                http_client,
                jwks_uri,
                key_sets: Cache::builder().max_capacity(16).time_to_live(cache_ttl).build(),
                last_forced_refresh: Mutex::new(None),
            }),
        }
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.inner.jwks_uri
    }

    async fn cached_or_fetch(&self) -> Result<(Arc<JsonWebKeySet>, bool), OidcRpError> {
        let http_client = self.inner.http_client.clone();
        let uri = self.inner.jwks_uri.clone();
        let entry = self
            .inner
            .key_sets
            .entry(self.inner.jwks_uri.clone())
            .or_try_insert_with(async move { fetch_key_set(&http_client, &uri).await })
            .await
            .map_err(unshare)?;
        let fresh = entry.is_fresh();
        Ok((entry.into_value(), fresh))
    }

    async fn refetch(&self) -> Result<Option<Arc<JsonWebKeySet>>, OidcRpError> {
        {
            let mut last = self.inner.last_forced_refresh.lock().await;
            if matches!(*last, Some(at) if at.elapsed() < FORCED_REFRESH_COOLDOWN) {
                return Ok(None);
            }
            *last = Some(Instant::now());
        }
        self.inner.key_sets.invalidate(&self.inner.jwks_uri).await;
        let http_client = self.inner.http_client.clone();
        let uri = self.inner.jwks_uri.clone();
        self.inner
            .key_sets
            .try_get_with(self.inner.jwks_uri.clone(), async move {
                fetch_key_set(&http_client, &uri).await
            })
            .await
            .map(Some)
            .map_err(unshare)
    }
}

#[async_trait]
impl KeyResolver for JwksClient {
    #[instrument(skip(self), fields(jwks_uri = %self.inner.jwks_uri), err)]
    async fn find_key(&self, kid: &str) -> Result<JsonWebKey, OidcRpError> {
        let (key_set, fresh) = self.cached_or_fetch().await?;
        if let Some(key) = key_set.find(kid) {
            debug!("JWK found for kid: {}", kid);
            return Ok(key.clone());
        }
        if fresh {
            return Err(OidcRpError::KeyNotFound(kid.to_string()));
        }

        debug!("kid {} not in cached key set. Refetching from provider.", kid);
        match self.refetch().await? {
            Some(key_set) => key_set
                .find(kid)
                .cloned()
                .ok_or_else(|| OidcRpError::KeyNotFound(kid.to_string())),
            None => {
                warn!("Skipping JWKS refetch for unknown kid {}: refreshed too recently", kid);
                Err(OidcRpError::KeyNotFound(kid.to_string()))
            }
        }
    }
}

fn unshare(shared: Arc<OidcRpError>) -> OidcRpError {
    Arc::try_unwrap(shared).unwrap_or_else(|e| OidcRpError::KeySetUnavailable(e.to_string()))
}

/// Fetches the JWKS from the provider.
async fn fetch_key_set(http_client: &reqwest::Client, jwks_uri: &Url) -> Result<Arc<JsonWebKeySet>, OidcRpError> {
    let response = http_client
        .get(jwks_uri.clone())
        .send()
        .await
        .map_err(|e| OidcRpError::KeySetUnavailable(format!("request failed: {e}")))?;
    if !response.status().is_success() {
        return Err(OidcRpError::KeySetUnavailable(format!(
            "JWKS endpoint returned {}",
            response.status()
        )));
    }
    let jwks: JsonWebKeySet = response
        .json()
        .await
        .map_err(|e| OidcRpError::KeySetUnavailable(format!("malformed key set: {e}")))?;
    debug!("Successfully fetched {} keys from {}", jwks.keys.len(), jwks_uri);
    Ok(Arc::new(jwks))
}

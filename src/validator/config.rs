// src/validator/config.rs

use crate::error::OidcRpError;
use crate::validator::algorithm::SigningAlgorithm;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// The client secret issued by the provider.
///
/// Used for HTTP Basic authentication at the token endpoint and as the MAC key
/// for HS* signed ID Tokens. Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret([redacted])")
    }
}

/// Where the provider's endpoints come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSource {
    /// Fetch the `.well-known/openid-configuration` document at this URL.
    Discovery(Url),
    /// Endpoints configured by hand; no discovery request is made.
    Static {
        issuer: String,
        authorization_endpoint: Url,
        token_endpoint: Url,
        jwks_endpoint: Url,
    },
}

/// The relying party's registration with the provider, plus validation policy.
///
/// Immutable once built; share it through an `Arc`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub redirect_uri: Url,
    pub provider: ProviderSource,
    /// Scopes requested at login. Must include `openid`.
    #[serde(default = "default_scopes", deserialize_with = "openid_scopes")]
    pub scopes: Vec<String>,
    /// The only algorithm accepted on ID Tokens.
    #[serde(default)]
    pub id_token_signed_response_alg: SigningAlgorithm,
    /// If set, the resolved provider metadata must carry exactly this issuer.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Oldest acceptable `iat`, relative to now.
    #[serde(default = "default_max_age", with = "secs")]
    pub max_token_age: Duration,
    /// Oldest acceptable `auth_time`, relative to now.
    #[serde(default = "default_max_age", with = "secs")]
    pub max_auth_age: Duration,
    /// Upper bound on every outbound request (discovery, token, JWKS).
    #[serde(default = "default_http_timeout", with = "secs")]
    pub http_timeout: Duration,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string()]
}

const OPENID_SCOPE: &str = "openid";

fn check_scopes(scopes: &[String]) -> Result<(), String> {
    if scopes.iter().any(|scope| scope == OPENID_SCOPE) {
        Ok(())
    } else {
        Err(format!("scopes {scopes:?} do not include '{OPENID_SCOPE}'"))
    }
}

fn openid_scopes<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let scopes = Vec::<String>::deserialize(deserializer)?;
    check_scopes(&scopes).map_err(serde::de::Error::custom)?;
    Ok(scopes)
}

fn default_max_age() -> Duration {
    DEFAULT_MAX_AGE
}

fn default_http_timeout() -> Duration {
    DEFAULT_HTTP_TIMEOUT
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl ClientConfig {
    /// Builds the shared `reqwest` client, bounded by `http_timeout`.
    pub fn http_client(&self) -> Result<reqwest::Client, OidcRpError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(OidcRpError::Http)
    }
}

/// A builder for creating a `ClientConfig` instance.
#[derive(Default)]
pub struct ConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<ClientSecret>,
    redirect_uri: Option<Url>,
    discovery_endpoint: Option<Url>,
    static_issuer: Option<String>,
    authorization_endpoint: Option<Url>,
    token_endpoint: Option<Url>,
    jwks_endpoint: Option<Url>,
    scopes: Option<Vec<String>>,
    algorithm: Option<SigningAlgorithm>,
    pinned_issuer: Option<String>,
    max_token_age: Option<Duration>,
    max_auth_age: Option<Duration>,
    http_timeout: Option<Duration>,
}

fn parse_url(url: &str) -> Result<Url, OidcRpError> {
    Url::parse(url).map_err(|e| OidcRpError::InvalidUrl(format!("{url}: {e}")))
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client ID. Required.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret. Required.
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(ClientSecret::new(secret));
        self
    }

    /// Sets the redirect URI registered with the provider. Required.
    pub fn redirect_uri(mut self, url: &str) -> Result<Self, OidcRpError> {
        self.redirect_uri = Some(parse_url(url)?);
        Ok(self)
    }

    /// Uses OIDC discovery. Mutually exclusive with the static endpoint setters.
    pub fn discovery_endpoint(mut self, url: &str) -> Result<Self, OidcRpError> {
        if self.has_static_endpoints() {
            return Err(OidcRpError::AmbiguousProviderSource(
                "Cannot set a discovery endpoint when static endpoints are already configured.".to_string(),
            ));
        }
        self.discovery_endpoint = Some(parse_url(url)?);
        Ok(self)
    }

    /// Configures the provider by hand instead of through discovery.
    pub fn static_provider(
        mut self,
        issuer: &str,
        authorization_endpoint: &str,
        token_endpoint: &str,
        jwks_endpoint: &str,
    ) -> Result<Self, OidcRpError> {
        if self.discovery_endpoint.is_some() {
            return Err(OidcRpError::AmbiguousProviderSource(
                "Cannot set static endpoints when a discovery endpoint is already configured.".to_string(),
            ));
        }
        self.static_issuer = Some(issuer.to_string());
        self.authorization_endpoint = Some(parse_url(authorization_endpoint)?);
        self.token_endpoint = Some(parse_url(token_endpoint)?);
        self.jwks_endpoint = Some(parse_url(jwks_endpoint)?);
        Ok(self)
    }

    /// Defaults to `["openid"]`. The list must include `openid`.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the expected `alg` of ID Tokens. Defaults to `RS256`.
    ///
    /// Fails with `UnsupportedAlgorithm` for `none` or anything unknown.
    pub fn id_token_signed_response_alg(mut self, alg: &str) -> Result<Self, OidcRpError> {
        self.algorithm = Some(alg.parse()?);
        Ok(self)
    }

    /// Pins the issuer the provider metadata must report.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.pinned_issuer = Some(issuer.into());
        self
    }

    /// Defaults to one hour.
    pub fn max_token_age(mut self, age: Duration) -> Self {
        self.max_token_age = Some(age);
        self
    }

    /// Defaults to one hour.
    pub fn max_auth_age(mut self, age: Duration) -> Self {
        self.max_auth_age = Some(age);
        self
    }

    /// Defaults to ten seconds.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    fn has_static_endpoints(&self) -> bool {
        self.static_issuer.is_some()
            || self.authorization_endpoint.is_some()
            || self.token_endpoint.is_some()
            || self.jwks_endpoint.is_some()
    }

    /// Consumes the builder and returns a `ClientConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or no provider source is set.
    pub fn build(self) -> Result<ClientConfig, OidcRpError> {
        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| OidcRpError::MissingConfiguration("client_id".to_string()))?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| OidcRpError::MissingConfiguration("client_secret".to_string()))?;
        let redirect_uri = self
            .redirect_uri
            .ok_or_else(|| OidcRpError::MissingConfiguration("redirect_uri".to_string()))?;

        let provider = match (self.discovery_endpoint, self.static_issuer) {
            (Some(url), None) => ProviderSource::Discovery(url),
            (None, Some(issuer)) => ProviderSource::Static {
                issuer,
                // All four are set together by `static_provider`.
                authorization_endpoint: self.authorization_endpoint.ok_or_else(|| {
                    OidcRpError::MissingConfiguration("authorization_endpoint".to_string())
                })?,
                token_endpoint: self
                    .token_endpoint
                    .ok_or_else(|| OidcRpError::MissingConfiguration("token_endpoint".to_string()))?,
                jwks_endpoint: self
                    .jwks_endpoint
                    .ok_or_else(|| OidcRpError::MissingConfiguration("jwks_endpoint".to_string()))?,
            },
            (Some(_), Some(_)) => {
                return Err(OidcRpError::AmbiguousProviderSource(
                    "Both a discovery endpoint and static endpoints are configured.".to_string(),
                ))
            }
            (None, None) => {
                return Err(OidcRpError::MissingConfiguration(
                    "discovery_endpoint or static provider endpoints".to_string(),
                ))
            }
        };

        let scopes = self.scopes.unwrap_or_else(default_scopes);
        check_scopes(&scopes).map_err(OidcRpError::InvalidConfiguration)?;

        Ok(ClientConfig {
            client_id,
            client_secret,
            redirect_uri,
            provider,
            scopes,
            id_token_signed_response_alg: self.algorithm.unwrap_or_default(),
            issuer: self.pinned_issuer,
            max_token_age: self.max_token_age.unwrap_or(DEFAULT_MAX_AGE),
            max_auth_age: self.max_auth_age.unwrap_or(DEFAULT_MAX_AGE),
            http_timeout: self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
        })
    }
}

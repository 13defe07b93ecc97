// src/exchange.rs

use crate::discovery::ProviderMetadata;
use crate::error::OidcRpError;
use crate::validator::config::ClientConfig;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Upper bound on how much of an error response is kept in the error message.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// The token endpoint's answer to an authorization code grant.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(rename = "id_token")]
    pub id_token_raw: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[redacted]")
            .field("id_token_raw", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Trades authorization codes for tokens at the provider's token endpoint.
#[derive(Clone)]
pub struct TokenExchangeClient {
    http_client: reqwest::Client,
    metadata: Arc<ProviderMetadata>,
    config: Arc<ClientConfig>,
}

impl TokenExchangeClient {
    pub fn new(http_client: reqwest::Client, metadata: Arc<ProviderMetadata>, config: Arc<ClientConfig>) -> Self {
        Self {
            http_client,
            metadata,
            config,
        }
    }

    /// Posts an `authorization_code` grant, authenticating with HTTP Basic.
    #[instrument(skip(self, code), fields(token_endpoint = %self.metadata.token_endpoint), err)]
    pub async fn exchange(&self, code: &str, redirect_uri: &Url) -> Result<TokenResponse, OidcRpError> {
        let response = self
            .http_client
            .post(self.metadata.token_endpoint.clone())
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.expose()))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OidcRpError::TokenExchange(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // The body of an error response carries `error`/`error_description`, never tokens.
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Token endpoint rejected the authorization code");
            return Err(OidcRpError::TokenExchange(format!(
                "token endpoint returned {status}: {}",
                truncated(&body, MAX_ERROR_BODY_BYTES)
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| OidcRpError::TokenExchange(format!("malformed token response: {e}")))?;
        debug!(token_type = ?tokens.token_type, "Authorization code exchanged");
        Ok(tokens)
    }
}

/// The longest prefix of `text` that fits in `max_bytes` and ends on a char boundary.
fn truncated(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

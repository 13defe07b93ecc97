// src/flow.rs

use crate::authorization::{AuthorizationRequestBuilder, ResponseType};
use crate::discovery::{MetadataResolver, ProviderMetadata};
use crate::error::OidcRpError;
use crate::exchange::TokenExchangeClient;
use crate::session::{PendingLogin, SessionStore};
use crate::validator::client::JwksClient;
use crate::validator::config::ClientConfig;
use crate::validator::keys::KeyResolver;
use crate::validator::token::IdTokenClaims;
use crate::validator::Validator;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};
use url::Url;

/// The outcome of a successful login.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The `sub` claim, the durable identity of the user at the provider.
    pub subject: String,
    pub claims: IdTokenClaims,
    pub access_token: AccessToken,
}

/// An access token whose `Debug` output is redacted.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

/// Drives the authorization code flow for one client and one provider.
///
/// Create it once at startup; it is cheap to clone and every login attempt
/// through it is independent.
#[derive(Clone)]
pub struct RelyingParty {
    config: Arc<ClientConfig>,
    metadata: Arc<ProviderMetadata>,
    exchange: TokenExchangeClient,
    validator: Validator,
    sessions: Arc<dyn SessionStore>,
}

impl RelyingParty {
    /// Resolves the provider and wires up a remote key resolver.
    ///
    /// Fails fast if the provider cannot be resolved.
    #[instrument(skip_all, fields(client_id = %config.client_id), err)]
    pub async fn discover(config: ClientConfig, sessions: Arc<dyn SessionStore>) -> Result<Self, OidcRpError> {
        let http_client = config.http_client()?;
        let metadata = MetadataResolver::new(http_client.clone())
            .resolve_for(&config)
            .await?;
        let keys = Arc::new(JwksClient::new(http_client.clone(), metadata.jwks_uri.clone()));
        Ok(Self::from_parts(Arc::new(config), metadata, keys, sessions, http_client))
    }

    /// Assembles a relying party from already-resolved parts.
    pub fn from_parts(
        config: Arc<ClientConfig>,
        metadata: Arc<ProviderMetadata>,
        keys: Arc<dyn KeyResolver>,
        sessions: Arc<dyn SessionStore>,
        http_client: reqwest::Client,
    ) -> Self {
        let exchange = TokenExchangeClient::new(http_client, metadata.clone(), config.clone());
        let validator = Validator::new(metadata.clone(), config.clone(), keys);
        Self {
            config,
            metadata,
            exchange,
            validator,
            sessions,
        }
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Starts a login: stores fresh `state`/`nonce` for the session and returns
    /// the URL to redirect the browser to.
    #[instrument(skip_all, err)]
    pub async fn begin_login(&self, session_id: &str) -> Result<Url, OidcRpError> {
        let request = AuthorizationRequestBuilder::new(
            &self.metadata,
            self.config.client_id.clone(),
            self.config.redirect_uri.clone(),
        )
        .scope(self.config.scopes.iter().cloned())
        .response_type(ResponseType::Code)
        .build();

        self.sessions
            .put(
                session_id,
                PendingLogin {
                    state: request.state,
                    nonce: request.nonce,
                },
            )
            .await;
        Ok(request.url)
    }

    /// Finishes a login from the callback's `code` and `state`.
    ///
    /// The pending login is removed before anything else, so it cannot be
    /// reused even if this call fails.
    #[instrument(skip_all, err)]
    pub async fn complete_login(
        &self,
        session_id: &str,
        code: &str,
        state: &str,
    ) -> Result<AuthenticatedUser, OidcRpError> {
        let pending = self
            .sessions
            .take(session_id)
            .await
            .ok_or(OidcRpError::UnknownLoginAttempt)?;

        if !bool::from(pending.state.as_bytes().ct_eq(state.as_bytes())) {
            warn!("Callback state does not match the pending login");
            return Err(OidcRpError::StateMismatch);
        }

        let tokens = self.exchange.exchange(code, &self.config.redirect_uri).await?;
        let validated = self
            .validator
            .validate(&tokens.id_token_raw, &pending.nonce)
            .await?;

        info!(sub = %validated.subject(), "User authenticated");
        Ok(AuthenticatedUser {
            subject: validated.subject().to_string(),
            claims: validated.claims,
            access_token: AccessToken(tokens.access_token),
        })
    }
}

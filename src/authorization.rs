// src/authorization.rs

use crate::discovery::ProviderMetadata;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// The OAuth 2.0 `response_type` requested at the authorization endpoint.
///
/// Only the authorization code flow is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    #[default]
    Code,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single login attempt's redirect to the provider.
///
/// `state` and `nonce` are random per request and must be kept by the caller
/// (session store) until the callback arrives, then consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub scope: Vec<String>,
    pub response_type: ResponseType,
    pub client_id: String,
    pub redirect_uri: Url,
    pub state: String,
    pub nonce: String,
}

/// Builds [`AuthorizationRequest`]s against a provider's authorization endpoint.
#[derive(Debug, Clone)]
pub struct AuthorizationRequestBuilder<'a> {
    metadata: &'a ProviderMetadata,
    client_id: String,
    redirect_uri: Url,
    scope: Vec<String>,
    response_type: ResponseType,
}

impl<'a> AuthorizationRequestBuilder<'a> {
    pub fn new(metadata: &'a ProviderMetadata, client_id: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            metadata,
            client_id: client_id.into(),
            redirect_uri,
            scope: vec!["openid".to_string()],
            response_type: ResponseType::Code,
        }
    }

    /// Replaces the requested scopes. Duplicates are dropped, first occurrence wins.
    pub fn scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for s in scope.into_iter().map(Into::into) {
            if !unique.contains(&s) {
                unique.push(s);
            }
        }
        self.scope = unique;
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Generates fresh `state` and `nonce` values and assembles the redirect URL.
    pub fn build(self) -> AuthorizationRequest {
        // UUIDv4 comes from the OS CSPRNG and carries 122 random bits.
        let state = Uuid::new_v4().to_string();
        let nonce = Uuid::new_v4().to_string();
        self.build_with(state, nonce)
    }

    fn build_with(self, state: String, nonce: String) -> AuthorizationRequest {
        let mut url = self.metadata.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("scope", &self.scope.join(" "))
            .append_pair("response_type", self.response_type.as_str())
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("state", &state)
            .append_pair("nonce", &nonce);

        AuthorizationRequest {
            url,
            scope: self.scope,
            response_type: self.response_type,
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            state,
            nonce,
        }
    }
}

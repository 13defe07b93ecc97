// src/validator/keys.rs

use super::model::{JsonWebKey, JsonWebKeySet};
use crate::error::OidcRpError;
use async_trait::async_trait;

/// Finds the provider's signing key for a key id.
///
/// Implemented by [`super::client::JwksClient`] for remote key sets and by
/// [`StaticKeyResolver`] for key sets supplied directly.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// # Errors
    ///
    /// `KeyNotFound` if no key carries `kid`; `KeySetUnavailable` if the set
    /// itself could not be obtained.
    async fn find_key(&self, kid: &str) -> Result<JsonWebKey, OidcRpError>;
}

/// A key resolver over a fixed, in-memory key set.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyResolver {
    keys: JsonWebKeySet,
}

impl StaticKeyResolver {
    pub fn new(keys: JsonWebKeySet) -> Self {
        Self { keys }
    }
}

impl From<JsonWebKeySet> for StaticKeyResolver {
    fn from(keys: JsonWebKeySet) -> Self {
        Self::new(keys)
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn find_key(&self, kid: &str) -> Result<JsonWebKey, OidcRpError> {
        self.keys
            .find(kid)
            .cloned()
            .ok_or_else(|| OidcRpError::KeyNotFound(kid.to_string()))
    }
}

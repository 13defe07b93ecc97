// src/validator/model.rs

use crate::error::OidcRpError;
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonWebKey {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl JsonWebKey {
    /// Builds a signature verification key from the RSA components of this JWK.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, OidcRpError> {
        if self.kty != "RSA" {
            return Err(OidcRpError::InvalidKeyFormat(format!(
                "unsupported key type '{}'",
                self.kty
            )));
        }
        if matches!(self.use_purpose.as_deref(), Some(purpose) if purpose != "sig") {
            return Err(OidcRpError::InvalidKeyFormat(
                "key is not published for signature use".to_string(),
            ));
        }
        let n = self
            .n
            .as_deref()
            .ok_or_else(|| OidcRpError::InvalidKeyFormat("RSA key missing 'n' component".to_string()))?;
        let e = self
            .e
            .as_deref()
            .ok_or_else(|| OidcRpError::InvalidKeyFormat("RSA key missing 'e' component".to_string()))?;
        DecodingKey::from_rsa_components(n, e)
            .map_err(|err| OidcRpError::InvalidKeyFormat(err.to_string()))
    }
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Finds the key whose `kid` equals the given key id.
    pub fn find(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }
}

// src/validator/mod.rs

pub mod algorithm;
pub mod client;
pub mod config;
pub mod keys;
pub mod model;
pub mod token;

use crate::discovery::ProviderMetadata;
use crate::error::OidcRpError;
use algorithm::{AlgorithmFamily, SigningAlgorithm};
use config::ClientConfig;
use jsonwebtoken::DecodingKey;
use keys::KeyResolver;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use token::{Audience, IdToken, IdTokenClaims, JoseHeader};
use tracing::{debug, instrument};

/// The stages of ID Token validation, in the order they are passed.
///
/// A token that fails any check is rejected at that stage; there is no way
/// back to an earlier stage and no retry within one validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationStage {
    Parsed,
    IssuerOk,
    AudienceOk,
    AlgorithmOk,
    SignatureOk,
    NotExpired,
    IatOk,
    NonceOk,
    Accepted,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::IssuerOk => "issuer",
            Self::AudienceOk => "audience",
            Self::AlgorithmOk => "algorithm",
            Self::SignatureOk => "signature",
            Self::NotExpired => "expiry",
            Self::IatOk => "issued_at",
            Self::NonceOk => "nonce",
            Self::Accepted => "accepted",
        };
        f.write_str(name)
    }
}

/// An ID Token that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedIdToken {
    pub header: JoseHeader,
    pub claims: IdTokenClaims,
    subject: String,
}

impl ValidatedIdToken {
    /// The authenticated subject. Always present on a validated token.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// The OIDC ID Token validator.
///
/// Holds the provider metadata, the client configuration and the key resolver
/// as immutable values; every call to [`Validator::validate`] is independent.
#[derive(Clone)]
pub struct Validator {
    metadata: Arc<ProviderMetadata>,
    config: Arc<ClientConfig>,
    keys: Arc<dyn KeyResolver>,
}

impl Validator {
    pub fn new(
        metadata: Arc<ProviderMetadata>,
        config: Arc<ClientConfig>,
        keys: Arc<dyn KeyResolver>,
    ) -> Self {
        Self {
            metadata,
            config,
            keys,
        }
    }

    /// Validates a raw ID Token against the nonce sent in the authorization request.
    #[instrument(skip(self, raw_token, nonce), err)]
    pub async fn validate(&self, raw_token: &str, nonce: &str) -> Result<ValidatedIdToken, OidcRpError> {
        self.validate_at(raw_token, nonce, now_secs()).await
    }

    /// Same as [`Validator::validate`], with the current time given in seconds since the epoch.
    pub async fn validate_at(
        &self,
        raw_token: &str,
        nonce: &str,
        now: i64,
    ) -> Result<ValidatedIdToken, OidcRpError> {
        let mut stage = None;
        let result = self.run_pipeline(raw_token, nonce, now, &mut stage).await;
        if let Err(e) = &result {
            let last_passed = stage.map_or_else(|| "none".to_string(), |s: ValidationStage| s.to_string());
            debug!(%last_passed, error = %e, "ID Token rejected");
        }
        result
    }

    async fn run_pipeline(
        &self,
        raw_token: &str,
        nonce: &str,
        now: i64,
        stage: &mut Option<ValidationStage>,
    ) -> Result<ValidatedIdToken, OidcRpError> {
        // 1. Parse.
        let token = IdToken::parse(raw_token)?;

        // 2. Encrypted tokens are unsupported.
        if token.is_encrypted() {
            return Err(OidcRpError::EncryptedToken);
        }
        let claims = token
            .claims()
            .ok_or_else(|| OidcRpError::MalformedToken("missing payload".to_string()))?;
        *stage = Some(ValidationStage::Parsed);

        // 3. Issuer.
        self.check_issuer(claims)?;
        *stage = Some(ValidationStage::IssuerOk);

        // 4. Audience and authorized party.
        self.check_audience(claims)?;
        *stage = Some(ValidationStage::AudienceOk);

        // 5. Algorithm. Compared as a string so `none` and unknown values fail here.
        let expected = self.config.id_token_signed_response_alg;
        if token.header().alg != expected.as_str() {
            return Err(OidcRpError::AlgorithmMismatch {
                expected: expected.to_string(),
                actual: token.header().alg.clone(),
            });
        }
        *stage = Some(ValidationStage::AlgorithmOk);

        // 6. Signature.
        self.verify_signature(&token).await?;
        *stage = Some(ValidationStage::SignatureOk);

        // 7. Expiry: valid only while exp is strictly in the future.
        match claims.exp {
            Some(exp) if exp > now => {}
            _ => return Err(OidcRpError::TokenExpired),
        }
        *stage = Some(ValidationStage::NotExpired);

        // 8. Issued-at staleness.
        if let Some(iat) = claims.iat {
            if is_older_than(iat, now, self.config.max_token_age.as_secs()) {
                return Err(OidcRpError::StaleToken);
            }
        }
        *stage = Some(ValidationStage::IatOk);

        // 9. Nonce.
        if claims.nonce.as_deref() != Some(nonce) {
            return Err(OidcRpError::NonceMismatch);
        }
        *stage = Some(ValidationStage::NonceOk);

        // 10. auth_time staleness, only when present and numeric.
        if let Some(auth_time) = claims.auth_time_secs() {
            if is_older_than(auth_time, now, self.config.max_auth_age.as_secs()) {
                return Err(OidcRpError::StaleAuthentication);
            }
        }

        // Checked last so that a missing `sub` never masks an earlier rejection.
        let subject = claims
            .sub
            .clone()
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| OidcRpError::MalformedToken("missing 'sub' claim".to_string()))?;
        *stage = Some(ValidationStage::Accepted);

        let (header, claims) = token.into_parts();
        let claims = claims.ok_or_else(|| OidcRpError::MalformedToken("missing payload".to_string()))?;
        debug!(sub = %subject, "ID Token accepted");
        Ok(ValidatedIdToken {
            header,
            claims,
            subject,
        })
    }

    fn check_issuer(&self, claims: &IdTokenClaims) -> Result<(), OidcRpError> {
        if claims.iss.as_deref() == Some(self.metadata.issuer.as_str()) {
            return Ok(());
        }
        Err(OidcRpError::IssuerMismatch {
            expected: self.metadata.issuer.clone(),
            actual: claims.iss.clone(),
        })
    }

    fn check_audience(&self, claims: &IdTokenClaims) -> Result<(), OidcRpError> {
        let client_id = self.config.client_id.as_str();
        match &claims.aud {
            None => Err(OidcRpError::MissingAudience),
            Some(aud @ Audience::Single(_)) => {
                if aud.contains(client_id) {
                    Ok(())
                } else {
                    Err(OidcRpError::AudienceMismatch)
                }
            }
            Some(aud @ Audience::Multiple(_)) => {
                if !aud.contains(client_id) {
                    return Err(OidcRpError::AudienceMismatch);
                }
                // A multi-audience token must name this client as the authorized party.
                match claims.azp.as_deref() {
                    Some(azp) if azp == client_id => Ok(()),
                    _ => Err(OidcRpError::AuthorizedParty),
                }
            }
        }
    }

    async fn verify_signature(&self, token: &IdToken) -> Result<(), OidcRpError> {
        let algorithm: SigningAlgorithm = token.header().alg.parse()?;

        let decoding_key = match algorithm.family() {
            AlgorithmFamily::Asymmetric => {
                let kid = token.header().kid.as_deref().ok_or(OidcRpError::MissingKeyId)?;
                let jwk = self.keys.find_key(kid).await?;
                jwk.to_decoding_key()?
            }
            AlgorithmFamily::Symmetric => {
                DecodingKey::from_secret(self.config.client_secret.expose().as_bytes())
            }
        };

        let valid = jsonwebtoken::crypto::verify(
            token.encoded_signature(),
            token.signing_input().as_bytes(),
            &decoding_key,
            algorithm.to_jsonwebtoken(),
        )
        .map_err(|e| {
            debug!("Signature verification error: {}", e);
            OidcRpError::InvalidSignature
        })?;

        if valid {
            Ok(())
        } else {
            Err(OidcRpError::InvalidSignature)
        }
    }
}

fn is_older_than(timestamp: i64, now: i64, max_age_secs: u64) -> bool {
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    now.saturating_sub(timestamp) > max_age
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

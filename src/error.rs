// src/error.rs

use thiserror::Error;

/// The message shown to end users for any failed login, whatever the cause.
pub const PUBLIC_FAILURE_MESSAGE: &str = "authentication failed";

/// The primary error type for the `oidc-rp` library.
#[derive(Debug, Error)]
pub enum OidcRpError {
    // --- Configuration ---
    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A provided URL could not be parsed or is not absolute.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Both a discovery endpoint and static provider endpoints were configured.
    #[error("Ambiguous provider configuration: {0}")]
    AmbiguousProviderSource(String),

    // --- Network layer ---
    /// The discovery document was unreachable, malformed, or incomplete.
    #[error("Provider discovery failed: {0}")]
    Discovery(String),

    /// The token endpoint rejected the request or returned an unreadable body.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The remote JSON Web Key Set could not be fetched or parsed.
    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// An error occurred during an HTTP request.
    #[error("HTTP request error")]
    Http(#[from] reqwest::Error),

    // --- Key resolution ---
    /// A key with the specified 'kid' was not found in the JSON Web Key Set.
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    /// The JWT header is missing the 'kid' (Key ID) field.
    #[error("The JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    /// A JWK is malformed or of a type that cannot verify the token.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    // --- ID Token validation ---
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Encrypted ID Tokens are not supported")]
    EncryptedToken,

    #[error("Issuer mismatch: expected '{expected}', found {actual:?}")]
    IssuerMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("The ID Token has no 'aud' claim")]
    MissingAudience,

    #[error("The 'aud' claim does not contain the client id")]
    AudienceMismatch,

    #[error("The 'azp' claim is missing or does not match the client id")]
    AuthorizedParty,

    #[error("Algorithm mismatch: expected {expected}, found '{actual}'")]
    AlgorithmMismatch { expected: String, actual: String },

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("The ID Token is expired or has no 'exp' claim")]
    TokenExpired,

    #[error("The ID Token was issued too long ago")]
    StaleToken,

    #[error("Nonce mismatch: the nonce in the token does not match the expected nonce")]
    NonceMismatch,

    #[error("The end-user authentication is too old")]
    StaleAuthentication,

    // --- Login flow ---
    /// The callback `state` does not match the value stored for the session.
    #[error("State mismatch")]
    StateMismatch,

    /// No pending login exists for the session (never started, expired, or already used).
    #[error("No pending login for this session")]
    UnknownLoginAttempt,
}

impl OidcRpError {
    /// Returns `true` for failures caused by the provider or the network.
    ///
    /// These may be retried or alerted on. Everything else is either a
    /// configuration problem or a security rejection.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::Discovery(_)
                | Self::TokenExchange(_)
                | Self::KeySetUnavailable(_)
                | Self::Http(_)
        )
    }

    /// Returns `true` when the token or callback was rejected on security grounds.
    /// Such failures must never be retried automatically.
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound(_)
                | Self::MissingKeyId
                | Self::InvalidKeyFormat(_)
                | Self::MalformedToken(_)
                | Self::EncryptedToken
                | Self::IssuerMismatch { .. }
                | Self::MissingAudience
                | Self::AudienceMismatch
                | Self::AuthorizedParty
                | Self::AlgorithmMismatch { .. }
                | Self::UnsupportedAlgorithm(_)
                | Self::InvalidSignature
                | Self::TokenExpired
                | Self::StaleToken
                | Self::NonceMismatch
                | Self::StaleAuthentication
                | Self::StateMismatch
                | Self::UnknownLoginAttempt
        )
    }

    /// The uniform message to show end users. Details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        PUBLIC_FAILURE_MESSAGE
    }
}

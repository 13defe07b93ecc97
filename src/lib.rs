// src/lib.rs

pub mod authorization;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod session;
pub mod validator;

/// The public prelude for the `oidc-rp` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::authorization::{AuthorizationRequest, AuthorizationRequestBuilder, ResponseType};
    pub use crate::discovery::{MetadataResolver, ProviderMetadata};
    pub use crate::error::OidcRpError;
    pub use crate::exchange::{TokenExchangeClient, TokenResponse};
    pub use crate::flow::{AuthenticatedUser, RelyingParty};
    pub use crate::session::{InMemorySessionStore, PendingLogin, SessionStore};
    pub use crate::validator::{
        algorithm::SigningAlgorithm,
        client::JwksClient,
        config::{ClientConfig, ConfigBuilder, ProviderSource},
        keys::{KeyResolver, StaticKeyResolver},
        model::{JsonWebKey, JsonWebKeySet},
        token::{Audience, IdToken, IdTokenClaims},
        ValidatedIdToken, ValidationStage, Validator,
    };
}

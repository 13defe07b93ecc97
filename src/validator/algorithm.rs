// src/validator/algorithm.rs

use crate::error::OidcRpError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The ID Token signing algorithms this relying party can verify.
///
/// `none` is deliberately not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    #[default]
    RS256,
    RS512,
    PS256,
    PS512,
    HS256,
    HS512,
}

/// How the verification key for an algorithm is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    /// Public key resolved from the provider's key set by `kid`.
    Asymmetric,
    /// MAC keyed with the UTF-8 bytes of the client secret.
    Symmetric,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS512 => "PS512",
            Self::HS256 => "HS256",
            Self::HS512 => "HS512",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::RS256 | Self::RS512 | Self::PS256 | Self::PS512 => AlgorithmFamily::Asymmetric,
            Self::HS256 | Self::HS512 => AlgorithmFamily::Symmetric,
        }
    }

    pub(crate) fn to_jsonwebtoken(self) -> jsonwebtoken::Algorithm {
        use jsonwebtoken::Algorithm;
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS512 => Algorithm::RS512,
            Self::PS256 => Algorithm::PS256,
            Self::PS512 => Algorithm::PS512,
            Self::HS256 => Algorithm::HS256,
            Self::HS512 => Algorithm::HS512,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = OidcRpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::RS256),
            "RS512" => Ok(Self::RS512),
            "PS256" => Ok(Self::PS256),
            "PS512" => Ok(Self::PS512),
            "HS256" => Ok(Self::HS256),
            "HS512" => Ok(Self::HS512),
            other => Err(OidcRpError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SigningAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SigningAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

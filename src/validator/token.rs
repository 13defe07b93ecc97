// src/validator/token.rs

use crate::error::OidcRpError;
use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// The JOSE header of a compact-serialized token.
///
/// `alg` is kept as the raw string so that values such as `none` survive
/// parsing and are rejected by the algorithm check instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JoseHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
    /// Content encryption algorithm. Only present on JWE headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<String>,
}

/// The `aud` claim, which may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// The claims carried by an ID Token.
///
/// No claim is structurally required. Presence and values are checked by the
/// validator, in its own order, not by parsing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,
    /// Kept untyped: a non-numeric `auth_time` is ignored rather than rejected.
    #[serde(default)]
    pub auth_time: Option<serde_json::Value>,
    #[serde(default)]
    pub nonce: Option<String>,
    /// Every other claim in the payload.
    #[serde(flatten)]
    pub additional: serde_json::Map<String, serde_json::Value>,
}

impl IdTokenClaims {
    /// `auth_time` as seconds since the epoch, when it is present and numeric.
    pub fn auth_time_secs(&self) -> Option<i64> {
        self.auth_time.as_ref().and_then(whole_seconds)
    }

    /// Deserializes the custom claims into a caller-defined type.
    pub fn additional_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.additional.clone()))
    }
}

/// An ID Token parsed from its compact serialization.
///
/// Parsing establishes structure only. Nothing about authenticity is implied
/// until the token has passed [`crate::validator::Validator::validate`].
#[derive(Clone)]
pub struct IdToken {
    raw: String,
    header: JoseHeader,
    payload: Option<IdTokenClaims>,
    signature: Vec<u8>,
    segment_count: usize,
}

impl IdToken {
    /// Parses a compact JWS (three segments) or recognises a compact JWE (five segments).
    pub fn parse(raw: &str) -> Result<Self, OidcRpError> {
        let segments: Vec<&str> = raw.split('.').collect();
        match segments.len() {
            3 => {
                let header: JoseHeader = decode_segment(segments[0], "header")?;
                if header.enc.is_some() {
                    return Ok(Self::encrypted(raw, header, segments.len()));
                }
                let payload: IdTokenClaims = decode_segment(segments[1], "payload")?;
                let signature = URL_SAFE_NO_PAD
                    .decode(segments[2])
                    .map_err(|e| OidcRpError::MalformedToken(format!("signature: {e}")))?;
                Ok(Self {
                    raw: raw.to_string(),
                    header,
                    payload: Some(payload),
                    signature,
                    segment_count: 3,
                })
            }
            5 => {
                let header: JoseHeader = decode_segment(segments[0], "header")?;
                Ok(Self::encrypted(raw, header, 5))
            }
            n => Err(OidcRpError::MalformedToken(format!(
                "expected 3 segments, found {n}"
            ))),
        }
    }

    fn encrypted(raw: &str, header: JoseHeader, segment_count: usize) -> Self {
        Self {
            raw: raw.to_string(),
            header,
            payload: None,
            signature: Vec::new(),
            segment_count,
        }
    }

    /// `true` if the token is a JWE rather than a JWS.
    pub fn is_encrypted(&self) -> bool {
        self.segment_count == 5 || self.header.enc.is_some()
    }

    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    /// The unverified claims. `None` for encrypted tokens.
    pub fn claims(&self) -> Option<&IdTokenClaims> {
        self.payload.as_ref()
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `header.payload` part of the token that the signature covers.
    pub(crate) fn signing_input(&self) -> &str {
        match self.raw.rfind('.') {
            Some(idx) => &self.raw[..idx],
            None => &self.raw,
        }
    }

    /// The base64url-encoded signature segment.
    pub(crate) fn encoded_signature(&self) -> &str {
        match self.raw.rfind('.') {
            Some(idx) => &self.raw[idx + 1..],
            None => "",
        }
    }

    pub(crate) fn into_parts(self) -> (JoseHeader, Option<IdTokenClaims>) {
        (self.header, self.payload)
    }
}

// Never print the raw token.
impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdToken")
            .field("header", &self.header)
            .field("encrypted", &self.is_encrypted())
            .finish_non_exhaustive()
    }
}

/// A NumericDate as whole seconds. Fractional values are rounded down.
fn whole_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|secs| secs.is_finite()).map(|secs| secs.floor() as i64))
}

fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => whole_seconds(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a NumericDate, found {value}"))),
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, OidcRpError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| OidcRpError::MalformedToken(format!("{what}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| OidcRpError::MalformedToken(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segment(value: serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&value).unwrap())
    }

    fn compact(header: serde_json::Value, payload: serde_json::Value) -> String {
        format!(
            "{}.{}.{}",
            segment(header),
            segment(payload),
            URL_SAFE_NO_PAD.encode(b"sig")
        )
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            IdToken::parse("aaa"),
            Err(OidcRpError::MalformedToken(_))
        ));
        assert!(matches!(
            IdToken::parse("a.b.c"),
            Err(OidcRpError::MalformedToken(_))
        ));
    }

    #[test]
    fn payload_without_subject_still_parses() {
        let raw = compact(json!({"alg": "RS256"}), json!({"iss": "https://idp.example"}));
        let token = IdToken::parse(&raw).unwrap();
        assert_eq!(token.claims().unwrap().sub, None);
    }

    #[test]
    fn numeric_dates_may_be_fractional() {
        let raw = compact(
            json!({"alg": "RS256"}),
            json!({"sub": "alice", "exp": 1_700_000_060.5, "iat": 1_700_000_000.25, "auth_time": 1_699_999_999.9}),
        );
        let token = IdToken::parse(&raw).unwrap();
        let claims = token.claims().unwrap();
        assert_eq!(claims.exp, Some(1_700_000_060));
        assert_eq!(claims.iat, Some(1_700_000_000));
        assert_eq!(claims.auth_time_secs(), Some(1_699_999_999));

        let raw = compact(json!({"alg": "RS256"}), json!({"sub": "alice", "exp": null}));
        assert_eq!(IdToken::parse(&raw).unwrap().claims().unwrap().exp, None);
    }

    #[test]
    fn non_numeric_dates_are_malformed() {
        let raw = compact(json!({"alg": "RS256"}), json!({"sub": "alice", "exp": "tomorrow"}));
        assert!(matches!(
            IdToken::parse(&raw),
            Err(OidcRpError::MalformedToken(msg)) if msg.contains("NumericDate")
        ));
    }

    #[test]
    fn parses_claims_and_keeps_unknown_ones() {
        let raw = compact(
            json!({"alg": "RS256", "kid": "k1", "typ": "JWT"}),
            json!({
                "iss": "https://idp.example",
                "sub": "alice",
                "aud": ["xxx", "yyy"],
                "azp": "xxx",
                "exp": 1_700_000_060,
                "auth_time": "yesterday",
                "email": "alice@example.com"
            }),
        );
        let token = IdToken::parse(&raw).unwrap();
        assert_eq!(token.header().kid.as_deref(), Some("k1"));
        assert_eq!(token.signature(), b"sig");
        let claims = token.claims().unwrap();
        assert_eq!(
            claims.aud,
            Some(Audience::Multiple(vec!["xxx".into(), "yyy".into()]))
        );
        assert_eq!(claims.auth_time_secs(), None);
        assert_eq!(claims.additional["email"], "alice@example.com");
        assert!(!token.is_encrypted());
        assert_eq!(token.signing_input(), raw.rsplit_once('.').unwrap().0);
    }

    #[test]
    fn recognises_jwe_shapes() {
        let five = format!("{}.key.iv.ciphertext.tag", segment(json!({"alg": "RSA-OAEP", "enc": "A256GCM"})));
        assert!(IdToken::parse(&five).unwrap().is_encrypted());

        let enc_header = compact(json!({"alg": "dir", "enc": "A128GCM"}), json!({"sub": "x"}));
        let token = IdToken::parse(&enc_header).unwrap();
        assert!(token.is_encrypted());
        assert!(token.claims().is_none());
    }

    #[test]
    fn audience_membership() {
        assert!(Audience::Single("xxx".into()).contains("xxx"));
        assert!(!Audience::Single("yyy".into()).contains("xxx"));
        assert!(Audience::Multiple(vec!["yyy".into(), "xxx".into()]).contains("xxx"));
    }

    #[test]
    fn debug_does_not_print_the_token() {
        let raw = compact(json!({"alg": "RS256"}), json!({"sub": "secret-subject"}));
        let token = IdToken::parse(&raw).unwrap();
        assert!(!format!("{token:?}").contains(&raw));
    }
}

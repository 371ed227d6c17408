//! Bearer token claims
//!
//! Tokens are issued and verified upstream; this only reads the payload to
//! learn the subject and realm roles. No signature check happens here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;

/// Claim decoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimsError {
    /// Not three dot-separated segments
    #[error("malformed token")]
    Malformed,

    /// Payload segment is not base64url
    #[error("token payload is not base64url: {0}")]
    Encoding(String),

    /// Payload is not the expected JSON
    #[error("token payload is not valid json: {0}")]
    Json(String),
}

/// Subset of the token payload the repository cares about
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub realm_access: RealmAccess,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Realm role assignment
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Decode the payload of a JWT, with or without a `Bearer ` prefix
    ///
    /// # Errors
    /// [`ClaimsError`] when the token is not a readable JWT.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let token = strip_bearer(token);
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(ClaimsError::Malformed);
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ClaimsError::Encoding(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))
    }

    /// Realm roles
    #[inline]
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.realm_access.roles
    }
}

/// Token without its `Bearer ` scheme prefix
#[must_use]
pub fn strip_bearer(token: &str) -> &str {
    token
        .strip_prefix("Bearer ")
        .or_else(|| token.strip_prefix("bearer "))
        .unwrap_or(token)
        .trim()
}

/// Build an unsigned token carrying `claims`, for tests and local tooling
#[must_use]
pub fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("Bearer {header}.{payload}.")
}

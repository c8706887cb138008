//! Credential token validation for connection-upgrade requests.
//!
//! Token issuance belongs to the account service; this gateway only
//! consumes its HS256-signed tokens. [`TokenValidator`] is the seam the
//! upgrade gate depends on, [`Hs256Validator`] the production
//! implementation.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Number of token characters allowed to appear in diagnostics.
const LOG_PREFIX_CHARS: usize = 10;

/// SHA-256 block size in bytes, used by the HMAC construction.
const SHA256_BLOCK: usize = 64;

/// Authenticated identity extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable subject identity; used as the hub registry key.
    pub subject_id: String,
    /// Human-readable label, carried for presentation only.
    pub display_name: String,
}

/// Reasons a credential token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The token is not three base64url segments of valid JSON.
    #[error("token is not a well-formed JWT")]
    Malformed,
    /// The token's header names an algorithm other than HS256.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The signature does not match the token contents.
    #[error("token signature mismatch")]
    BadSignature,
    /// The token's expiry is in the past.
    #[error("token has expired")]
    Expired,
    /// The claims segment is missing required fields.
    #[error("token claims are missing or invalid")]
    InvalidClaims,
}

/// Validates a credential token into a [`Principal`].
///
/// Injected into the upgrade gate so the gateway never depends on how
/// tokens are minted.
pub trait TokenValidator: Send + Sync + fmt::Debug {
    /// Validates `token`, returning the authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] describing why the token was rejected.
    fn validate(&self, token: &str) -> Result<Principal, AuthError>;
}

/// Claims carried by the account service's tokens.
#[derive(Debug, Deserialize)]
struct Claims {
    user_id: String,
    user_name: String,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

/// HS256 verifier for the account service's JWTs.
#[derive(Clone)]
pub struct Hs256Validator {
    secret: Vec<u8>,
}

impl Hs256Validator {
    /// Creates a validator for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Hs256Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hs256Validator")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenValidator for Hs256Validator {
    fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| AuthError::Malformed)?;
        let header: Header =
            serde_json::from_slice(&header_json).map_err(|_| AuthError::Malformed)?;
        if header.alg != "HS256" {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::Malformed)?;
        let signed = token
            .get(..header_b64.len() + 1 + claims_b64.len())
            .ok_or(AuthError::Malformed)?;
        let expected = hmac_sha256(&self.secret, signed.as_bytes());
        if !constant_time_eq(&expected, &signature) {
            return Err(AuthError::BadSignature);
        }

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AuthError::InvalidClaims)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| AuthError::InvalidClaims)?;
        if claims.user_id.is_empty() {
            return Err(AuthError::InvalidClaims);
        }
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(Principal {
            subject_id: claims.user_id,
            display_name: claims.user_name,
        })
    }
}

/// HMAC-SHA256 (RFC 2104) of `message` under `key`.
fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let hashed;
    let key_bytes: &[u8] = if key.len() > SHA256_BLOCK {
        hashed = Sha256::digest(key);
        hashed.as_slice()
    } else {
        key
    };

    let mut block = [0u8; SHA256_BLOCK];
    for (slot, byte) in block.iter_mut().zip(key_bytes) {
        *slot = *byte;
    }

    let mut inner = Sha256::new();
    inner.update(block.map(|b| b ^ 0x36));
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(block.map(|b| b ^ 0x5c));
    outer.update(inner_digest);
    outer.finalize().into()
}

/// Compares two byte strings without short-circuiting on the first
/// mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Returns a bounded prefix of `token` safe to include in diagnostics.
/// The full token never reaches a log line.
#[must_use]
pub fn token_prefix(token: &str) -> String {
    token.chars().take(LOG_PREFIX_CHARS).collect()
}

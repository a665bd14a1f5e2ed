//! Loading of the token-signing public key from configuration.
//!
//! The identity authority signs user tokens with an RSA key. Operators supply
//! the matching X.509 `SubjectPublicKeyInfo` either as a PEM document or as a
//! bare Base64 string, usually on a single line of an env file.

use common::jwt::{armour_public_key_der, decode_public_key_material};
use jsonwebtoken::DecodingKey;
use thiserror::Error;

/// Reasons the configured public key cannot be used.
///
/// Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum PublicKeyError {
    #[error("JWT public key is empty")]
    Empty,

    #[error("JWT public key is not valid Base64: {0}")]
    InvalidBase64(String),

    #[error("JWT public key is not a valid RSA public key: {0}")]
    InvalidKey(String),
}

/// Parse `raw` into an RSA verification key.
///
/// # Errors
///
/// Returns `PublicKeyError` if `raw` is blank, is not Base64 once armour and
/// whitespace are removed, or does not hold an RSA `SubjectPublicKeyInfo`.
pub fn load_public_key(raw: &str) -> Result<DecodingKey, PublicKeyError> {
    if raw.trim().is_empty() {
        return Err(PublicKeyError::Empty);
    }

    let der =
        decode_public_key_material(raw).map_err(|e| PublicKeyError::InvalidBase64(e.to_string()))?;

    if der.is_empty() {
        return Err(PublicKeyError::Empty);
    }

    let pem = armour_public_key_der(&der);
    DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| PublicKeyError::InvalidKey(e.to_string()))
}

//! Bearer-token and JWT helpers shared by the notification crates.
//!
//! This module provides the pieces of JWT handling that do not depend on a
//! particular signing algorithm:
//! - Size limits checked before any parsing
//! - Clock skew constants for expiry evaluation
//! - `Authorization: Bearer` header extraction
//! - Expiry evaluation against an explicit clock
//! - Decoding of Base64 public key material, with or without PEM armour
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Error messages are generic; details are logged at debug level
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_token_size, extract_bearer_token};
//!
//! let token = extract_bearer_token(headers.get("authorization"))?;
//! check_token_size(token)?;
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any Base64 decoding or signature
/// verification. User tokens issued by the identity authority are well under
/// 1KB, including the `userEmail` and `userName` claims.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default leeway applied when evaluating `exp` (none).
///
/// A token is treated as expired the instant its `exp` is in the past.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(0);

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Configuration above this value is rejected at startup.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Scheme prefix expected on the `Authorization` header, including the space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Line width used when re-armouring DER key material as PEM.
const PEM_LINE_WIDTH: usize = 64;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur before a token reaches signature verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("Invalid JWT token")]
    TokenTooLarge,
}

/// Reasons a request carries no usable bearer token.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    /// No `Authorization` header was sent.
    #[error("Authorization header is missing or invalid.")]
    Missing,

    /// The header is present but does not start with `Bearer `, or the token
    /// after the prefix is empty.
    #[error("Authorization header is missing or invalid.")]
    Malformed,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the token from a raw `Authorization` header value.
///
/// The prefix match is case-sensitive and requires exactly one space. Nothing
/// after the prefix is trimmed; a header of `"Bearer "` yields
/// [`BearerError::Malformed`].
///
/// # Errors
///
/// - `Missing` - `header` is `None`
/// - `Malformed` - wrong scheme or empty token
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, BearerError> {
    let header = header.ok_or(BearerError::Missing)?;

    let token = header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Authorization header is not a bearer credential");
        BearerError::Malformed
    })?;

    if token.is_empty() {
        tracing::debug!(target: "common.jwt", "Bearer credential is empty");
        return Err(BearerError::Malformed);
    }

    Ok(token)
}

/// Reject tokens larger than [`MAX_JWT_SIZE_BYTES`].
///
/// # Errors
///
/// Returns `JwtValidationError::TokenTooLarge` when the token is oversized.
pub fn check_token_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }
    Ok(())
}

/// Whether a token with the given `exp` is expired right now.
#[must_use]
pub fn is_expired(exp: i64, leeway: Duration) -> bool {
    is_expired_at(exp, leeway, chrono::Utc::now().timestamp())
}

/// Deterministic expiry check against an explicit `now` timestamp.
///
/// A token is expired when `exp + leeway < now`. A token whose `exp` equals
/// `now` is still valid.
#[must_use]
pub fn is_expired_at(exp: i64, leeway: Duration, now: i64) -> bool {
    // Safe cast: leeway is bounded to MAX_CLOCK_SKEW (600 seconds)
    #[allow(clippy::cast_possible_wrap)]
    let leeway_secs = leeway.as_secs() as i64;
    exp.saturating_add(leeway_secs) < now
}

/// Decode Base64 public key material into DER bytes.
///
/// Accepts a bare Base64 string or a full PEM document. Armour lines
/// (`-----BEGIN ...` / `-----END ...`), all whitespace and literal `\n`
/// escape sequences are removed before decoding, so values copied from a
/// single-line environment variable work unchanged.
///
/// # Errors
///
/// Returns `base64::DecodeError` if what remains is not valid standard Base64.
pub fn decode_public_key_material(raw: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let unescaped = raw.replace("\\n", "\n");
    let b64: String = unescaped
        .lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(str::chars)
        .filter(|c| !c.is_whitespace())
        .collect();

    STANDARD.decode(b64)
}

/// Wrap DER bytes of a `SubjectPublicKeyInfo` in `PUBLIC KEY` PEM armour.
#[must_use]
pub fn armour_public_key_der(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::with_capacity(encoded.len() + encoded.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN PUBLIC KEY-----\n");
    // Base64 output is ASCII, so every chunk is valid UTF-8
    for chunk in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // extract_bearer_token
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_bearer_token_valid() {
        assert_eq!(extract_bearer_token(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        assert_eq!(extract_bearer_token(None), Err(BearerError::Missing));
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        assert_eq!(extract_bearer_token(Some("Token abc")), Err(BearerError::Malformed));
        assert_eq!(extract_bearer_token(Some("Basic dXNlcjpwYXNz")), Err(BearerError::Malformed));
    }

    #[test]
    fn test_extract_bearer_token_is_case_sensitive() {
        assert_eq!(extract_bearer_token(Some("bearer abc")), Err(BearerError::Malformed));
        assert_eq!(extract_bearer_token(Some("BEARER abc")), Err(BearerError::Malformed));
    }

    #[test]
    fn test_extract_bearer_token_empty_after_prefix() {
        assert_eq!(extract_bearer_token(Some("Bearer ")), Err(BearerError::Malformed));
        assert_eq!(extract_bearer_token(Some("Bearer")), Err(BearerError::Malformed));
    }

    #[test]
    fn test_extract_bearer_token_keeps_extra_spaces() {
        assert_eq!(extract_bearer_token(Some("Bearer  abc")), Ok(" abc"));
    }

    #[test]
    fn test_bearer_error_messages_match_remark() {
        assert_eq!(
            BearerError::Missing.to_string(),
            "Authorization header is missing or invalid."
        );
        assert_eq!(BearerError::Missing.to_string(), BearerError::Malformed.to_string());
    }

    // -------------------------------------------------------------------------
    // check_token_size
    // -------------------------------------------------------------------------

    #[test]
    fn test_check_token_size_at_limit() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES);
        assert!(check_token_size(&token).is_ok());
    }

    #[test]
    fn test_check_token_size_over_limit() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(check_token_size(&token), Err(JwtValidationError::TokenTooLarge));
    }

    // -------------------------------------------------------------------------
    // is_expired_at
    // -------------------------------------------------------------------------

    #[test]
    fn test_is_expired_at_boundaries() {
        let now = 1_700_000_000;
        assert!(!is_expired_at(now, DEFAULT_CLOCK_SKEW, now));
        assert!(!is_expired_at(now + 1, DEFAULT_CLOCK_SKEW, now));
        assert!(is_expired_at(now - 1, DEFAULT_CLOCK_SKEW, now));
    }

    #[test]
    fn test_is_expired_at_with_leeway() {
        let now = 1_700_000_000;
        let leeway = Duration::from_secs(60);
        assert!(!is_expired_at(now - 60, leeway, now));
        assert!(is_expired_at(now - 61, leeway, now));
    }

    #[test]
    fn test_is_expired_at_does_not_overflow() {
        assert!(!is_expired_at(i64::MAX, MAX_CLOCK_SKEW, 0));
    }

    #[test]
    fn test_is_expired_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(is_expired(now - 3600, DEFAULT_CLOCK_SKEW));
        assert!(!is_expired(now + 3600, DEFAULT_CLOCK_SKEW));
    }

    // -------------------------------------------------------------------------
    // decode_public_key_material / armour_public_key_der
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_bare_base64() {
        let der = decode_public_key_material("AQIDBA==").unwrap();
        assert_eq!(der, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_strips_armour_and_whitespace() {
        let pem = "-----BEGIN PUBLIC KEY-----\n  AQID\n BA==  \n-----END PUBLIC KEY-----\n";
        assert_eq!(decode_public_key_material(pem).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_handles_literal_newline_escapes() {
        let raw = "-----BEGIN PUBLIC KEY-----\\nAQID\\nBA==\\n-----END PUBLIC KEY-----";
        assert_eq!(decode_public_key_material(raw).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(decode_public_key_material("not*base64!").is_err());
    }

    #[test]
    fn test_armour_round_trips_through_decode() {
        let der: Vec<u8> = (0..=255u8).collect();
        let pem = armour_public_key_der(&der);

        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        assert!(pem.ends_with("-----END PUBLIC KEY-----\n"));
        assert!(pem
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .all(|l| l.len() <= 64));
        assert_eq!(decode_public_key_material(&pem).unwrap(), der);
    }
}

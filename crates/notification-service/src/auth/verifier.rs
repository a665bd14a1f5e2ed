//! Token verification against the authority's RSA public key.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only RS256, RS384 and RS512 are accepted; `none` and HMAC are rejected
//! - `exp` is required and checked with the configured clock skew
//! - An expired token is reported only after its signature has been verified,
//!   so the claims it carries can be trusted for auditing

use crate::auth::claims::Claims;
use crate::auth::public_key::{load_public_key, PublicKeyError};
use common::jwt::{check_token_size, is_expired};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Placeholder recorded in audits when no subject can be read from a token.
pub const INVALID_USER_ID: &str = "Invalid UserID";

/// Placeholder recorded in audits when no user name can be read from a token.
pub const INVALID_USERNAME: &str = "Invalid Username";

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Why a token was not accepted.
///
/// The `Display` text of each variant is the remark recorded for the request.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Not a structurally valid token.
    #[error("Invalid JWT token")]
    Malformed,

    /// Signature is valid but `exp` has passed. The decoded claims are kept.
    #[error("JWT token is expired")]
    Expired { claims: Box<Claims> },

    /// Signature does not match, or the algorithm is not accepted.
    #[error("Invalid JWT token")]
    InvalidSignature,

    /// Any other decoding failure, message preserved.
    #[error("{0}")]
    Unknown(String),
}

impl VerifyError {
    /// Claims decoded from an expired token, if this is `Expired`.
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            VerifyError::Expired { claims } => Some(claims),
            _ => None,
        }
    }
}

/// Verifies user tokens with a single, process-wide public key.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    clock_skew: Duration,
}

impl TokenVerifier {
    /// Create a verifier.
    ///
    /// # Arguments
    ///
    /// * `decoding_key` - RSA public key of the identity authority
    /// * `clock_skew` - Leeway applied to `exp` (and `nbf`)
    pub fn new(decoding_key: DecodingKey, clock_skew: Duration) -> Self {
        Self {
            decoding_key,
            clock_skew,
        }
    }

    /// Create a verifier from configured key material.
    ///
    /// # Errors
    ///
    /// Returns `PublicKeyError` when `raw` is not a usable RSA public key.
    pub fn from_public_key(raw: &str, clock_skew: Duration) -> Result<Self, PublicKeyError> {
        Ok(Self::new(load_public_key(raw)?, clock_skew))
    }

    fn validation(&self, validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = validate_exp;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError`; `Expired` carries the decoded claims.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        if check_token_size(token).is_err() {
            return Err(VerifyError::Malformed);
        }

        match decode::<Claims>(token, &self.decoding_key, &self.validation(true)) {
            Ok(data) => {
                tracing::debug!(target: "ns.auth.verifier", "Token verified successfully");
                Ok(data.claims)
            }
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                let data = decode::<Claims>(token, &self.decoding_key, &self.validation(false))
                    .map_err(classify)?;
                tracing::debug!(target: "ns.auth.verifier", exp = data.claims.exp, "Token is expired");
                Err(VerifyError::Expired {
                    claims: Box::new(data.claims),
                })
            }
            Err(e) => Err(classify(e)),
        }
    }

    /// Whether `claims` have expired as of now, with the configured leeway.
    pub fn is_expired(&self, claims: &Claims) -> bool {
        is_expired(claims.exp, self.clock_skew)
    }

    /// Who a token names, for audit records.
    ///
    /// Valid and expired tokens yield their `sub` and `userName` claims from a
    /// single verification. Any other token yields the
    /// [`INVALID_USER_ID`] and [`INVALID_USERNAME`] placeholders.
    pub fn audit_identity(&self, token: &str) -> AuditIdentity {
        let claims = match self.verify(token) {
            Ok(claims) => claims,
            Err(VerifyError::Expired { claims }) => *claims,
            Err(_) => return AuditIdentity::invalid(),
        };

        AuditIdentity {
            user_id: claims.sub,
            username: claims.user_name,
        }
    }
}

/// Caller identity as written into an audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditIdentity {
    pub user_id: String,
    pub username: String,
}

impl AuditIdentity {
    fn invalid() -> Self {
        Self {
            user_id: INVALID_USER_ID.to_string(),
            username: INVALID_USERNAME.to_string(),
        }
    }
}

fn classify(error: JwtError) -> VerifyError {
    tracing::debug!(target: "ns.auth.verifier", error = %error, "Token verification failed");
    match error.kind() {
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => VerifyError::Malformed,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => VerifyError::InvalidSignature,
        _ => VerifyError::Unknown(error.to_string()),
    }
}

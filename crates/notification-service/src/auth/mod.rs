//! Authentication module.
//!
//! Verifies user tokens against the authority's RSA public key and models the
//! identity resolved for an authenticated request.

pub mod claims;
pub mod principal;
pub mod public_key;
pub mod verifier;

pub use claims::Claims;
pub use principal::Principal;
pub use public_key::{load_public_key, PublicKeyError};
pub use verifier::{AuditIdentity, TokenVerifier, VerifyError};

//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use them for the
//! values that pass through the authentication pipeline and must never show up
//! in logs: the configured public key material, forwarded `Authorization`
//! headers, and credential hashes returned by the identity authority.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that derives
//! `Debug` while holding one gets safe logging behavior for free.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ForwardedAuth {
//!     subject: String,
//!     header: SecretString,
//! }
//!
//! let auth = ForwardedAuth {
//!     subject: "user-42".to_string(),
//!     header: SecretString::from("Bearer eyJhbGciOi..."),
//! };
//!
//! assert!(!format!("{auth:?}").contains("eyJhbGciOi"));
//! assert!(auth.header.expose_secret().starts_with("Bearer "));
//! ```

pub use secrecy::{ExposeSecret, SecretString};

/// Placeholder written in place of a secret in hand-written `Debug` impls.
pub const REDACTED: &str = "[REDACTED]";

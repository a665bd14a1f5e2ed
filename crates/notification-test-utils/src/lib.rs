//! # Notification Test Utilities
//!
//! Shared test utilities for the notification service.
//!
//! This crate provides:
//! - Deterministic RSA keypairs (`test_keypair(1)` is trusted by the service,
//!   `test_keypair(2)` is a forger)
//! - Token builders with sensible default claims
//! - Server test harness (`TestNotificationServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notification_test_utils::*;
//!
//! let token = TestTokenBuilder::new()
//!     .for_user("user-42")
//!     .with_email("alice@example.com")
//!     .expired()
//!     .sign(&test_keypair(1)?)?;
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;

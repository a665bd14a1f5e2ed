//! Common utilities shared across the notification service crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for bearer-token and JWT helpers (size limits, clock skew, expiry)
pub mod jwt;

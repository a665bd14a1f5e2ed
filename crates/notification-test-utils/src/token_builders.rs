//! Builder patterns for test data construction
//!
//! Provides a fluent API for the user tokens the identity authority issues.

use crate::crypto_fixtures::{FixtureError, TestKeypair};
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("user-42")
///     .with_email("alice@example.com")
///     .expires_in(3600)
///     .sign(&test_keypair(1)?)?;
/// ```
pub struct TestTokenBuilder {
    sub: String,
    user_email: String,
    user_name: String,
    exp: i64,
    iat: i64,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-user-id".to_string(),
            user_email: "test.user@example.com".to_string(),
            user_name: "Test User".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            extra: Map::new(),
        }
    }

    /// Set the subject (user id)
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the `userEmail` claim
    pub fn with_email(mut self, email: &str) -> Self {
        self.user_email = email.to_string();
        self
    }

    /// Set the `userName` claim
    pub fn with_name(mut self, name: &str) -> Self {
        self.user_name = name.to_string();
        self
    }

    /// Add an arbitrary custom claim
    pub fn with_claim(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Shorthand for a token that expired an hour ago
    pub fn expired(self) -> Self {
        self.expires_in(-3600)
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = json!({
            "sub": self.sub,
            "userEmail": self.user_email,
            "userName": self.user_name,
            "exp": self.exp,
            "iat": self.iat,
        });
        if let Value::Object(map) = &mut claims {
            map.extend(self.extra);
        }
        claims
    }

    /// Build and sign with RS256 using `keypair`
    pub fn sign(self, keypair: &TestKeypair) -> Result<String, FixtureError> {
        keypair.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

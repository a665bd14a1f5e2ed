//! JWT claims structure.
//!
//! Contains the claims carried by user tokens from the identity authority.
//! `sub` and `userEmail` are redacted in Debug output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Claims of a user token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Email of the user the token was issued to - redacted in Debug output.
    #[serde(rename = "userEmail", default)]
    pub user_email: String,

    /// Display name of the user the token was issued to.
    #[serde(rename = "userName", default)]
    pub user_name: String,

    /// Any other claims the authority adds.
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("user_email", &"[REDACTED]")
            .field("user_name", &self.user_name)
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Claims {
    /// Look up a custom claim by name.
    pub fn custom_claim(&self, name: &str) -> Option<&Value> {
        self.custom.get(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Claims {
        serde_json::from_value(json!({
            "sub": "secret-user-id",
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "userEmail": "alice@example.com",
            "userName": "Alice",
            "role": "ADMIN",
            "tenant": {"id": 7}
        }))
        .unwrap()
    }

    #[test]
    fn test_claims_debug_redacts_identifiers() {
        let debug_str = format!("{:?}", sample());

        assert!(
            !debug_str.contains("secret-user-id"),
            "Debug output should not contain actual sub value"
        );
        assert!(!debug_str.contains("alice@example.com"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("Alice"));
    }

    #[test]
    fn test_claims_wire_names() {
        let claims = sample();
        assert_eq!(claims.user_email, "alice@example.com");
        assert_eq!(claims.user_name, "Alice");
        assert_eq!(claims.iat, Some(1_700_000_000));

        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["userEmail"], "alice@example.com");
        assert_eq!(value["userName"], "Alice");
    }

    #[test]
    fn test_custom_claims_are_flattened() {
        let claims = sample();
        assert_eq!(claims.custom_claim("role"), Some(&json!("ADMIN")));
        assert_eq!(claims.custom_claim("tenant"), Some(&json!({"id": 7})));
        assert!(claims.custom_claim("sub").is_none());
        assert!(claims.custom_claim("missing").is_none());
    }

    #[test]
    fn test_optional_claims_default() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "u-1",
            "exp": 1_700_003_600
        }))
        .unwrap();

        assert_eq!(claims.iat, None);
        assert!(claims.user_email.is_empty());
        assert!(claims.user_name.is_empty());
        assert!(claims.custom.is_empty());
    }

    #[test]
    fn test_missing_exp_is_rejected() {
        let result = serde_json::from_value::<Claims>(json!({"sub": "u-1"}));
        assert!(result.is_err());
    }
}

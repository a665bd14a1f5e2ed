//! The resolved identity of an authenticated caller.

use common::secret::{SecretString, REDACTED};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// A user profile confirmed by the identity authority for one request.
///
/// Lives in the request's extensions as `Arc<Principal>` and is dropped with
/// the request.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    #[serde(skip)]
    pub credential: SecretString,
    pub authorities: BTreeSet<String>,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &REDACTED)
            .field("email", &REDACTED)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("credential", &REDACTED)
            .field("authorities", &self.authorities)
            .finish()
    }
}

impl Principal {
    /// The name used for identity comparisons: the email address.
    pub fn username(&self) -> &str {
        &self.email
    }

    /// Whether the principal was granted `authority`.
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

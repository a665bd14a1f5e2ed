//! HTTP client for the identity authority.
//!
//! Resolves the subject of a verified token into the caller's current profile
//! with `GET <base>/profile`. The original `Authorization` header is forwarded
//! so the authority can re-validate the token itself.
//!
//! # Security
//!
//! - The forwarded header and the credential in the response are never logged
//! - Connect and total timeouts bound every lookup

use crate::auth::Principal;
use crate::errors::NsError;
use crate::observability::metrics::record_authority_request;
use async_trait::async_trait;
use common::secret::SecretString;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Message used when the authority declines without saying why.
pub const DEFAULT_NOT_FOUND_MESSAGE: &str = "User not found";

/// Message used when the authority reports success but sends no profile.
pub const MISSING_PROFILE_MESSAGE: &str = "User profile is missing from authority response";

/// Why a subject could not be resolved.
///
/// The `Display` text is the underlying message, verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The authority answered and does not recognise the user.
    #[error("{0}")]
    NotFound(String),

    /// The authority could not be reached or gave an unreadable answer.
    #[error("{0}")]
    AuthorityUnreachable(String),
}

/// Resolves token subjects to principals.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Look up `subject`, forwarding the caller's `Authorization` header.
    async fn resolve(
        &self,
        subject: &str,
        forwarded_auth_header: &str,
    ) -> Result<Principal, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "data")]
    user: Option<AuthorityProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorityProfile {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    email: String,
    #[serde(default, alias = "displayName")]
    username: String,
    #[serde(default)]
    role: String,
    #[serde(default, alias = "credential")]
    password: Option<String>,
    #[serde(default)]
    authorities: Option<Vec<String>>,
}

impl From<AuthorityProfile> for Principal {
    fn from(profile: AuthorityProfile) -> Self {
        let authorities: BTreeSet<String> = match profile.authorities {
            Some(list) => list.into_iter().collect(),
            None if !profile.role.is_empty() => BTreeSet::from([profile.role.clone()]),
            None => BTreeSet::new(),
        };

        Principal {
            user_id: profile.user_id,
            email: profile.email,
            display_name: profile.username,
            role: profile.role,
            credential: SecretString::from(profile.password.unwrap_or_default()),
            authorities,
        }
    }
}

/// Identity authority client.
#[derive(Clone)]
pub struct AuthorityClient {
    client: Client,
    profile_url: String,
}

impl AuthorityClient {
    /// Create a new authority client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Authority base URL; surrounding whitespace and trailing
    ///   slashes are ignored
    /// * `timeout` - Used for both the connect and the total request timeout
    ///
    /// # Errors
    ///
    /// Returns `NsError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NsError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                error!(target: "ns.services.authority", error = %e, "Failed to build HTTP client");
                NsError::Internal
            })?;

        Ok(Self {
            client,
            profile_url: format!("{}/profile", base_url.trim().trim_end_matches('/')),
        })
    }

    /// The URL profiles are fetched from.
    pub fn profile_url(&self) -> &str {
        &self.profile_url
    }

    async fn fetch_profile(
        &self,
        subject: &str,
        forwarded_auth_header: &str,
    ) -> Result<Principal, ResolveError> {
        let response = self
            .client
            .get(&self.profile_url)
            .header("Authorization", forwarded_auth_header)
            .header("X-User-Id", subject)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(target: "ns.services.authority", error = %e, "Authority request failed");
                ResolveError::AuthorityUnreachable(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(target: "ns.services.authority", error = %e, "Failed to read authority response");
            ResolveError::AuthorityUnreachable(e.to_string())
        })?;

        let parsed: ProfileResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(target: "ns.services.authority", status = %status, error = %e, "Unreadable authority response");
            ResolveError::AuthorityUnreachable(format!(
                "Unreadable response from identity authority (HTTP {}): {}",
                status.as_u16(),
                e
            ))
        })?;

        if !parsed.success {
            let message = parsed
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_NOT_FOUND_MESSAGE.to_string());
            debug!(target: "ns.services.authority", status = %status, "Authority did not return a profile");
            return Err(ResolveError::NotFound(message));
        }

        let profile = parsed
            .user
            .ok_or_else(|| ResolveError::NotFound(MISSING_PROFILE_MESSAGE.to_string()))?;

        Ok(Principal::from(profile))
    }
}

#[async_trait]
impl IdentityResolver for AuthorityClient {
    #[instrument(skip_all)]
    async fn resolve(
        &self,
        subject: &str,
        forwarded_auth_header: &str,
    ) -> Result<Principal, ResolveError> {
        let start = Instant::now();
        let result = self.fetch_profile(subject, forwarded_auth_header).await;

        let status = match &result {
            Ok(_) => "success",
            Err(ResolveError::NotFound(_)) => "not_found",
            Err(ResolveError::AuthorityUnreachable(_)) => "error",
        };
        record_authority_request(status, start.elapsed());

        result
    }
}

/// Mock identity resolver module for testing.
pub mod mock {
    use super::*;
    use std::sync::{Mutex, PoisonError};

    /// A lookup seen by [`MockIdentityResolver`].
    #[derive(Debug, Clone)]
    pub struct ResolveCall {
        pub subject: String,
        pub forwarded_auth_header: SecretString,
    }

    /// Mock resolver returning a fixed outcome.
    pub struct MockIdentityResolver {
        outcome: Result<Principal, ResolveError>,
        latency: Duration,
        calls: Mutex<Vec<ResolveCall>>,
    }

    impl MockIdentityResolver {
        /// Create a mock that always resolves to `principal`.
        pub fn returning(principal: Principal) -> Self {
            Self::with_outcome(Ok(principal))
        }

        /// Create a mock for a user with the given email.
        pub fn for_email(email: &str) -> Self {
            Self::returning(Principal {
                user_id: "mock-user-id".to_string(),
                email: email.to_string(),
                display_name: "Mock User".to_string(),
                role: "USER".to_string(),
                credential: SecretString::from(String::new()),
                authorities: BTreeSet::from(["USER".to_string()]),
            })
        }

        /// Create a mock whose authority does not know the user.
        pub fn not_found(message: &str) -> Self {
            Self::with_outcome(Err(ResolveError::NotFound(message.to_string())))
        }

        /// Create a mock whose authority cannot be reached.
        pub fn unreachable(message: &str) -> Self {
            Self::with_outcome(Err(ResolveError::AuthorityUnreachable(message.to_string())))
        }

        /// Take `latency` to answer each lookup.
        #[must_use]
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn with_outcome(outcome: Result<Principal, ResolveError>) -> Self {
            Self {
                outcome,
                latency: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Lookups made so far, oldest first.
        pub fn calls(&self) -> Vec<ResolveCall> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }

    #[async_trait]
    impl IdentityResolver for MockIdentityResolver {
        async fn resolve(
            &self,
            subject: &str,
            forwarded_auth_header: &str,
        ) -> Result<Principal, ResolveError> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ResolveCall {
                    subject: subject.to_string(),
                    forwarded_auth_header: SecretString::from(forwarded_auth_header),
                });
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.outcome.clone()
        }
    }
}

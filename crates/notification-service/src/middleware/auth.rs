//! Authentication gate for protected routes.
//!
//! `require_auth` decides every request in the same order:
//!
//! 1. The `Authorization` header must hold a bearer credential
//! 2. The token must verify against the authority's public key
//! 3. The token subject must resolve to a profile at the identity authority
//! 4. The profile email must match the token's `userEmail` claim, and the
//!    token must still be unexpired after the lookup
//!
//! Each request produces exactly one audit record, success or not. The audit
//! is awaited before the response is produced, so it stays inside the
//! request's cancellation boundary. The authority lookup is bounded by
//! `AuthState::lookup_timeout`; a lookup that runs past it is rejected like an
//! unreachable authority.
//!
//! On success the resolved principal is inserted into the request extensions
//! as `Arc<Principal>`. The extensions are dropped with the request, so no
//! identity outlives it.

use crate::auth::verifier::VerifyError;
use crate::auth::{Principal, TokenVerifier};
use crate::errors::NsError;
use crate::observability::metrics::record_auth_decision;
use crate::services::audit::AuditLogger;
use crate::services::authority_client::{IdentityResolver, ResolveError};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use common::jwt::extract_bearer_token;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Activity type recorded for gate decisions.
pub const AUTH_ACTIVITY_TYPE: &str = "Request authentication";

/// Remark for a missing or non-bearer `Authorization` header.
pub const REMARK_HEADER_INVALID: &str = "Authorization header is missing or invalid.";

/// Remark for a correctly signed token whose `exp` has passed.
pub const REMARK_TOKEN_EXPIRED: &str = "JWT token is expired";

/// Remark for a malformed or forged token.
pub const REMARK_TOKEN_INVALID: &str = "Invalid JWT token";

/// Remark for an identity mismatch or a token that expired during the lookup.
pub const REMARK_IDENTITY_MISMATCH: &str = "Invalid or expired JWT token";

/// Remark recorded when the request is let through.
pub const REMARK_AUTHENTICATED: &str = "Authentication successful.";

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Verifier holding the authority's public key.
    pub verifier: Arc<TokenVerifier>,

    /// Identity authority lookup.
    pub resolver: Arc<dyn IdentityResolver>,

    /// Audit logger for gate decisions.
    pub auditor: Arc<dyn AuditLogger>,

    /// Longest the gate waits for the identity authority.
    pub lookup_timeout: Duration,
}

/// Why the gate turned a request away.
#[derive(Debug)]
struct Rejection {
    outcome: &'static str,
    remark: String,
}

impl Rejection {
    fn new(outcome: &'static str, remark: impl Into<String>) -> Self {
        Self {
            outcome,
            remark: remark.into(),
        }
    }
}

impl From<VerifyError> for Rejection {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Expired { .. } => Rejection::new("token_expired", REMARK_TOKEN_EXPIRED),
            VerifyError::Malformed => Rejection::new("token_malformed", REMARK_TOKEN_INVALID),
            VerifyError::InvalidSignature => {
                Rejection::new("token_invalid_signature", REMARK_TOKEN_INVALID)
            }
            VerifyError::Unknown(message) => Rejection::new("token_error", message),
        }
    }
}

impl From<ResolveError> for Rejection {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(message) => Rejection::new("identity_not_found", message),
            ResolveError::AuthorityUnreachable(message) => {
                Rejection::new("authority_unreachable", message)
            }
        }
    }
}

async fn authenticate(state: &AuthState, raw_header: Option<&str>) -> Result<Principal, Rejection> {
    let token = extract_bearer_token(raw_header).map_err(|e| {
        debug!(target: "ns.middleware.auth", reason = ?e, "Unusable Authorization header");
        Rejection::new("header_invalid", REMARK_HEADER_INVALID)
    })?;

    let claims = state.verifier.verify(token)?;

    // The authority re-validates the token, so it gets the header as sent
    let lookup = state
        .resolver
        .resolve(&claims.sub, raw_header.unwrap_or_default());
    let principal = match tokio::time::timeout(state.lookup_timeout, lookup).await {
        Ok(resolved) => resolved?,
        Err(_) => {
            warn!(
                target: "ns.middleware.auth",
                timeout_secs = state.lookup_timeout.as_secs(),
                "Identity authority lookup timed out"
            );
            return Err(ResolveError::AuthorityUnreachable(format!(
                "Identity authority did not respond within {} seconds",
                state.lookup_timeout.as_secs()
            ))
            .into());
        }
    };

    if principal.username() != claims.user_email || state.verifier.is_expired(&claims) {
        debug!(target: "ns.middleware.auth", "Resolved identity does not match token");
        return Err(Rejection::new("identity_mismatch", REMARK_IDENTITY_MISMATCH));
    }

    Ok(principal)
}

/// Authentication middleware for user tokens.
///
/// # Response
///
/// - Returns 401 Unauthorized with the decision remark as `message` when the
///   request is rejected
/// - Continues to next handler with `Arc<Principal>` in extensions otherwise
#[instrument(
    skip_all,
    name = "ns.middleware.auth",
    fields(method = %req.method(), path = %req.uri().path())
)]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, NsError> {
    // Non-UTF-8 values still count as present
    let raw_header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let record = state.auditor.create_record(
        AUTH_ACTIVITY_TYPE,
        req.uri().path(),
        req.method().as_str(),
    );

    match authenticate(&state, raw_header.as_deref()).await {
        Ok(principal) => {
            record_auth_decision("authenticated");
            state
                .auditor
                .log_audit(record, 200, REMARK_AUTHENTICATED, raw_header.as_deref())
                .await;

            req.extensions_mut().insert(Arc::new(principal));
            Ok(next.run(req).await)
        }
        Err(rejection) => {
            debug!(
                target: "ns.middleware.auth",
                outcome = rejection.outcome,
                "Request rejected"
            );
            record_auth_decision(rejection.outcome);
            state
                .auditor
                .log_audit(record, 401, &rejection.remark, raw_header.as_deref())
                .await;

            Err(NsError::Unauthorized(rejection.remark))
        }
    }
}

/// Extension trait for reading the authenticated principal from a request.
pub trait PrincipalExt {
    /// Get the principal installed by [`require_auth`].
    ///
    /// Returns `None` if the auth middleware was not applied to this request.
    fn principal(&self) -> Option<&Principal>;
}

impl<B> PrincipalExt for axum::extract::Request<B> {
    fn principal(&self) -> Option<&Principal> {
        self.extensions().get::<Arc<Principal>>().map(AsRef::as_ref)
    }
}

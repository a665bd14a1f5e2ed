//! Current-user endpoint.
//!
//! Returns the principal the authentication gate resolved for this request.

use crate::auth::Principal;
use crate::models::ApiResponse;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Requires `require_auth`. The stored credential is never serialized.
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "message": "Authenticated user",
///   "data": {
///     "userId": "user-42",
///     "email": "alice@example.com",
///     "displayName": "Alice",
///     "role": "USER",
///     "authorities": ["USER"]
///   }
/// }
/// ```
#[instrument(skip_all, name = "ns.handlers.me")]
pub async fn get_me(
    Extension(principal): Extension<Arc<Principal>>,
) -> Json<ApiResponse<Principal>> {
    tracing::debug!(target: "ns.handlers.me", "Returning authenticated principal");

    Json(ApiResponse::success(
        Principal::clone(&principal),
        "Authenticated user",
    ))
}

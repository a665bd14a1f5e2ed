//! Notification service error types.
//!
//! HTTP-facing failures map to status codes via the `IntoResponse` impl.
//! Every error body uses the `ApiResponse` envelope:
//! `{ "success": false, "message": "<reason>" }`.

use crate::models::ApiResponse;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Value of the `WWW-Authenticate` header sent with every 401.
pub const WWW_AUTHENTICATE_VALUE: &str =
    "Bearer realm=\"notification-service\", error=\"invalid_token\"";

/// Notification service error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 Unauthorized
/// - ServiceUnavailable: 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum NsError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl NsError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            NsError::Unauthorized(_) => 401,
            NsError::ServiceUnavailable(_) => 503,
            NsError::Internal => 500,
        }
    }
}

impl IntoResponse for NsError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            // The reason is the audit remark and is safe to return
            NsError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason),
            NsError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "ns.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            NsError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        };

        let mut response = (status, Json(ApiResponse::<()>::error(message))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = WWW_AUTHENTICATE_VALUE.parse() {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header_value);
            }
        }

        response
    }
}

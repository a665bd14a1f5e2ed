//! Notification service models.
//!
//! Contains data types shared between the authentication gate, the audit
//! pipeline and the HTTP handlers.

use serde::{Deserialize, Serialize};

/// Outcome recorded on an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failure,
}

impl ResponseStatus {
    /// `Success` for 2xx status codes, `Failure` for everything else.
    pub fn from_status_code(status_code: u16) -> Self {
        if (200..300).contains(&status_code) {
            ResponseStatus::Success
        } else {
            ResponseStatus::Failure
        }
    }

    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "SUCCESS",
            ResponseStatus::Failure => "FAILURE",
        }
    }
}

/// One audit event, as published to the audit queue.
///
/// Field names on the wire match what audit consumers already read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub status_code: u16,
    pub user_id: String,
    pub username: String,
    pub activity_type: String,
    pub activity_description: String,
    pub request_action_endpoint: String,
    pub response_status: Option<ResponseStatus>,
    #[serde(rename = "requestHTTPVerb")]
    pub request_http_verb: String,
    pub remarks: String,
}

/// Standard JSON envelope for every response body.
///
/// Error responses look like `{ "success": false, "message": "<reason>" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// A failed response with no payload.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

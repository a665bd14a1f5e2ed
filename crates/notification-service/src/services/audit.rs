//! Audit recording for inbound requests.
//!
//! Builds [`AuditRecord`]s and forwards them to the bounded publisher. The
//! caller is never failed because of an audit problem.

use crate::auth::verifier::TokenVerifier;
use crate::models::{AuditRecord, ResponseStatus};
use crate::services::publisher::BoundedMessagePublisher;
use async_trait::async_trait;
use common::jwt::extract_bearer_token;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Records the outcome of an activity.
///
/// Implementations never fail the caller; audit problems are theirs to log.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    /// Start a record for an activity. Status fields stay empty until
    /// [`log_audit`](Self::log_audit).
    fn create_record(&self, activity_type: &str, endpoint: &str, http_method: &str) -> AuditRecord {
        AuditRecord {
            activity_type: activity_type.to_string(),
            activity_description: activity_type.to_string(),
            request_action_endpoint: endpoint.to_string(),
            request_http_verb: http_method.to_string(),
            ..AuditRecord::default()
        }
    }

    /// Complete `record` with the outcome and emit it.
    ///
    /// `raw_auth_header` is the request's `Authorization` header as received,
    /// or `None` when the request had none.
    async fn log_audit(
        &self,
        record: AuditRecord,
        status_code: u16,
        remarks: &str,
        raw_auth_header: Option<&str>,
    );
}

/// Creates audit records and hands them to the publisher.
pub struct AuditRecorder {
    verifier: Arc<TokenVerifier>,
    publisher: Arc<BoundedMessagePublisher>,
}

impl AuditRecorder {
    pub fn new(verifier: Arc<TokenVerifier>, publisher: Arc<BoundedMessagePublisher>) -> Self {
        Self {
            verifier,
            publisher,
        }
    }
}

#[async_trait]
impl AuditLogger for AuditRecorder {
    /// Complete `record` and publish it.
    ///
    /// `userId` and `username` come from the bearer token in `raw_auth_header`
    /// when it holds a verifiable (possibly expired) token. They are left empty
    /// when the header is absent or not a bearer credential.
    #[instrument(skip_all, fields(status_code = status_code))]
    async fn log_audit(
        &self,
        mut record: AuditRecord,
        status_code: u16,
        remarks: &str,
        raw_auth_header: Option<&str>,
    ) {
        record.status_code = status_code;
        record.response_status = Some(ResponseStatus::from_status_code(status_code));
        record.remarks = remarks.to_string();

        if let Ok(token) = extract_bearer_token(raw_auth_header) {
            let identity = self.verifier.audit_identity(token);
            record.user_id = identity.user_id;
            record.username = identity.username;
        }

        debug!(
            target: "ns.services.audit",
            activity_type = %record.activity_type,
            status_code,
            response_status = record.response_status.map(|s| s.as_str()),
            "Recording audit event"
        );

        self.publisher.publish(&record).await;
    }
}

/// Mock audit logger for testing.
pub mod mock {
    use super::*;
    use common::secret::SecretString;
    use std::sync::{Mutex, PoisonError};

    /// A `log_audit` call seen by [`RecordingAuditLogger`].
    #[derive(Debug, Clone)]
    pub struct LoggedAudit {
        pub record: AuditRecord,
        pub status_code: u16,
        pub remarks: String,
        pub raw_auth_header: Option<SecretString>,
    }

    /// Audit logger that keeps the arguments of every call.
    #[derive(Default)]
    pub struct RecordingAuditLogger {
        calls: Mutex<Vec<LoggedAudit>>,
    }

    impl RecordingAuditLogger {
        pub fn new() -> Self {
            Self::default()
        }

        /// Calls made so far, oldest first.
        pub fn calls(&self) -> Vec<LoggedAudit> {
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
    impl AuditLogger for RecordingAuditLogger {
        async fn log_audit(
            &self,
            record: AuditRecord,
            status_code: u16,
            remarks: &str,
            raw_auth_header: Option<&str>,
        ) {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(LoggedAudit {
                    record,
                    status_code,
                    remarks: remarks.to_string(),
                    raw_auth_header: raw_auth_header.map(SecretString::from),
                });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::verifier::{INVALID_USERNAME, INVALID_USER_ID};
    use crate::services::sink::mock::{FailingSink, RecordingSink};
    use notification_test_utils::{test_keypair, TestTokenBuilder};
    use std::time::Duration;

    fn recorder_with(sink: Arc<RecordingSink>) -> AuditRecorder {
        let key = test_keypair(1).unwrap().public_key_base64();
        let verifier = Arc::new(TokenVerifier::from_public_key(&key, Duration::ZERO).unwrap());
        let publisher = Arc::new(BoundedMessagePublisher::new(sink, Duration::from_secs(5)));
        AuditRecorder::new(verifier, publisher)
    }

    #[test]
    fn test_create_record_initializes_fields() {
        let recorder = recorder_with(Arc::new(RecordingSink::new()));
        let record = recorder.create_record("Request authentication", "/api/v1/me", "GET");

        assert_eq!(record.activity_type, "Request authentication");
        assert_eq!(record.activity_description, "Request authentication");
        assert_eq!(record.request_action_endpoint, "/api/v1/me");
        assert_eq!(record.request_http_verb, "GET");
        assert_eq!(record.status_code, 0);
        assert!(record.response_status.is_none());
        assert!(record.user_id.is_empty());
        assert!(record.remarks.is_empty());
    }

    #[tokio::test]
    async fn test_log_audit_with_valid_token() {
        let sink = Arc::new(RecordingSink::new());
        let recorder = recorder_with(sink.clone());
        let token = TestTokenBuilder::new()
            .for_user("user-42")
            .with_name("Alice")
            .sign(&test_keypair(1).unwrap())
            .unwrap();
        let header = format!("Bearer {token}");

        let record = recorder.create_record("Request authentication", "/api/v1/me", "GET");
        recorder
            .log_audit(record, 200, "Authentication successful.", Some(&header))
            .await;

        let bodies = sink.json_bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["statusCode"], 200);
        assert_eq!(bodies[0]["responseStatus"], "SUCCESS");
        assert_eq!(bodies[0]["userId"], "user-42");
        assert_eq!(bodies[0]["username"], "Alice");
        assert_eq!(bodies[0]["remarks"], "Authentication successful.");
        assert_eq!(sink.messages()[0].delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_log_audit_with_expired_token_still_identifies_user() {
        let sink = Arc::new(RecordingSink::new());
        let recorder = recorder_with(sink.clone());
        let token = TestTokenBuilder::new()
            .for_user("user-42")
            .with_name("Alice")
            .expired()
            .sign(&test_keypair(1).unwrap())
            .unwrap();
        let header = format!("Bearer {token}");

        let record = recorder.create_record("Request authentication", "/api/v1/me", "GET");
        recorder
            .log_audit(record, 401, "JWT token is expired", Some(&header))
            .await;

        let bodies = sink.json_bodies();
        assert_eq!(bodies[0]["userId"], "user-42");
        assert_eq!(bodies[0]["username"], "Alice");
        assert_eq!(bodies[0]["responseStatus"], "FAILURE");
    }

    #[tokio::test]
    async fn test_log_audit_with_forged_token_uses_placeholders() {
        let sink = Arc::new(RecordingSink::new());
        let recorder = recorder_with(sink.clone());
        let token = TestTokenBuilder::new()
            .sign(&test_keypair(2).unwrap())
            .unwrap();
        let header = format!("Bearer {token}");

        let record = recorder.create_record("Request authentication", "/api/v1/me", "GET");
        recorder
            .log_audit(record, 401, "Invalid JWT token", Some(&header))
            .await;

        let bodies = sink.json_bodies();
        assert_eq!(bodies[0]["userId"], INVALID_USER_ID);
        assert_eq!(bodies[0]["username"], INVALID_USERNAME);
    }

    #[tokio::test]
    async fn test_log_audit_without_bearer_header_leaves_user_empty() {
        let sink = Arc::new(RecordingSink::new());
        let recorder = recorder_with(sink.clone());

        for header in [None, Some("Token abc")] {
            let record = recorder.create_record("Request authentication", "/api/v1/me", "GET");
            recorder
                .log_audit(
                    record,
                    401,
                    "Authorization header is missing or invalid.",
                    header,
                )
                .await;
        }

        for body in sink.json_bodies() {
            assert_eq!(body["userId"], "");
            assert_eq!(body["username"], "");
        }
        assert_eq!(sink.call_count(), 2);
    }

    #[tokio::test]
    async fn test_recording_logger_keeps_header_verbatim() {
        use common::secret::ExposeSecret;

        let logger = mock::RecordingAuditLogger::new();
        for header in [None, Some("Token abc")] {
            let record = logger.create_record("Request authentication", "/api/v1/me", "GET");
            logger.log_audit(record, 401, "denied", header).await;
        }

        let calls = logger.calls();
        assert_eq!(logger.call_count(), 2);
        assert!(calls[0].raw_auth_header.is_none());
        assert_eq!(
            calls[1].raw_auth_header.as_ref().map(|h| h.expose_secret()),
            Some("Token abc")
        );
        assert_eq!(calls[1].record.request_action_endpoint, "/api/v1/me");
        assert!(!format!("{:?}", calls[1]).contains("Token abc"));
    }

    #[tokio::test]
    async fn test_log_audit_survives_sink_failure() {
        let sink = Arc::new(FailingSink::new());
        let key = test_keypair(1).unwrap().public_key_base64();
        let verifier = Arc::new(TokenVerifier::from_public_key(&key, Duration::ZERO).unwrap());
        let publisher = Arc::new(BoundedMessagePublisher::new(sink.clone(), Duration::ZERO));
        let recorder = AuditRecorder::new(verifier, publisher);

        let record = recorder.create_record("Request authentication", "/api/v1/me", "GET");
        recorder.log_audit(record, 401, "Invalid JWT token", None).await;

        assert_eq!(sink.call_count(), 1);
    }
}

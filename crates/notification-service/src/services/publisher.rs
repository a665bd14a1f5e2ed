//! Size-bounded publishing of audit records.
//!
//! A record is serialized to JSON and handed to the [`MessageSink`]. When the
//! payload exceeds the queue's message ceiling, only the free-text `remarks`
//! field is shortened. Publishing is best effort: every failure is logged and
//! counted, never returned to the request path.

use crate::models::AuditRecord;
use crate::observability::metrics::record_audit_publish;
use crate::services::sink::{MessageSink, SinkError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Largest message body the audit queue accepts (256 KiB).
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// Appended to remarks that were cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// Bytes reserved beyond the overflow when shortening remarks.
///
/// Covers the marker, with slack so the result lands under the ceiling.
pub const MARKER_OVERHEAD_BYTES: usize = 5;

/// Default bound on a single send, matching the default queue timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from preparing or sending an audit message.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize audit record: {0}")]
    Serialization(String),

    #[error("Audit message is {size} bytes after truncating remarks, ceiling is {ceiling}")]
    Truncation { size: usize, ceiling: usize },

    #[error(transparent)]
    Send(#[from] SinkError),

    #[error("Audit queue did not answer within {0:?}")]
    SendTimeout(Duration),
}

/// A serialized record that fits under the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedMessage {
    pub body: String,
    pub truncated: bool,
}

/// Shorten `remarks` so that it gives up at least `overflow` bytes.
///
/// Returns an empty string when `overflow` is at least the length of
/// `remarks`, or when nothing would be left after reserving
/// [`MARKER_OVERHEAD_BYTES`]. Otherwise the kept prefix ends on a character
/// boundary and is followed by [`TRUNCATION_MARKER`].
pub fn truncate_remarks(remarks: &str, overflow: usize) -> String {
    let len = remarks.len();
    if overflow >= len {
        return String::new();
    }

    let allowed = len.saturating_sub(overflow.saturating_add(MARKER_OVERHEAD_BYTES));
    let mut cut = allowed;
    while !remarks.is_char_boundary(cut) {
        cut = cut.saturating_sub(1);
    }

    match remarks.get(..cut) {
        Some(kept) if !kept.is_empty() => format!("{kept}{TRUNCATION_MARKER}"),
        _ => String::new(),
    }
}

/// Serialize `record`, shortening its remarks if the payload exceeds `ceiling`.
///
/// `record` itself is never modified.
///
/// # Errors
///
/// - `Serialization` if the record cannot be encoded
/// - `Truncation` if the payload is still too large with the remarks emptied
pub fn fit_to_ceiling(record: &AuditRecord, ceiling: usize) -> Result<FittedMessage, PublishError> {
    let body = serialize(record)?;
    if body.len() <= ceiling {
        return Ok(FittedMessage {
            body,
            truncated: false,
        });
    }

    let overflow = body.len().saturating_sub(ceiling);
    let mut shrunk = record.clone();
    shrunk.remarks = truncate_remarks(&record.remarks, overflow);
    debug!(
        target: "ns.services.publisher",
        original_bytes = body.len(),
        overflow,
        remarks_bytes_before = record.remarks.len(),
        remarks_bytes_after = shrunk.remarks.len(),
        "Truncated audit remarks to fit message ceiling"
    );

    // Every removed remarks byte removes at least one serialized byte, so one
    // pass is enough unless the other fields alone exceed the ceiling.
    let body = serialize(&shrunk)?;
    if body.len() > ceiling {
        return Err(PublishError::Truncation {
            size: body.len(),
            ceiling,
        });
    }

    Ok(FittedMessage {
        body,
        truncated: true,
    })
}

fn serialize(record: &AuditRecord) -> Result<String, PublishError> {
    serde_json::to_string(record).map_err(|e| PublishError::Serialization(e.to_string()))
}

/// Publishes audit records to a sink under a fixed size ceiling.
pub struct BoundedMessagePublisher {
    sink: Arc<dyn MessageSink>,
    delay: Duration,
    ceiling: usize,
    send_timeout: Duration,
}

impl BoundedMessagePublisher {
    /// Create a publisher with the standard [`MAX_MESSAGE_BYTES`] ceiling.
    ///
    /// # Arguments
    ///
    /// * `sink` - Where messages go
    /// * `delay` - Visibility delay passed through to the sink on every send
    pub fn new(sink: Arc<dyn MessageSink>, delay: Duration) -> Self {
        Self {
            sink,
            delay,
            ceiling: MAX_MESSAGE_BYTES,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the size ceiling.
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Override the bound on each send. A send still running when it
    /// elapses is abandoned.
    #[must_use]
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Fit and send `record`, returning the sink's message id.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` for serialization, truncation or send failures,
    /// and `SendTimeout` when the sink does not answer in time.
    pub async fn try_publish(&self, record: &AuditRecord) -> Result<(String, bool), PublishError> {
        let fitted = fit_to_ceiling(record, self.ceiling)?;
        let message_id =
            tokio::time::timeout(self.send_timeout, self.sink.send(fitted.body, self.delay))
                .await
                .map_err(|_| PublishError::SendTimeout(self.send_timeout))??;
        Ok((message_id, fitted.truncated))
    }

    /// Best-effort publish. Failures are logged and swallowed.
    #[instrument(skip_all, fields(activity_type = %record.activity_type, status_code = record.status_code))]
    pub async fn publish(&self, record: &AuditRecord) {
        match self.try_publish(record).await {
            Ok((message_id, truncated)) => {
                record_audit_publish(if truncated { "truncated_sent" } else { "sent" });
                debug!(
                    target: "ns.services.publisher",
                    message_id = %message_id,
                    truncated,
                    "Audit record published"
                );
            }
            Err(e) => {
                record_audit_publish("failed");
                warn!(target: "ns.services.publisher", error = %e, "Failed to publish audit record");
            }
        }
    }
}

//! Outbound message sink for audit events.
//!
//! `SqsSink` speaks the SQS JSON protocol (`AmazonSQS.SendMessage`). Requests
//! are not SigV4-signed; deployments point `AUDIT_QUEUE_ENDPOINT` at a local
//! queue emulator or a signing proxy.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

const SQS_TARGET_SEND_MESSAGE: &str = "AmazonSQS.SendMessage";
const SQS_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Errors from handing a message to the queue.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Invalid queue URL: {0}")]
    InvalidQueueUrl(String),

    #[error("Failed to build queue client: {0}")]
    Client(String),

    #[error("Queue request failed: {0}")]
    Transport(String),

    #[error("Queue rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unreadable queue response: {0}")]
    InvalidResponse(String),
}

/// Destination for serialized audit messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `body`, to become visible to consumers after `delay`.
    ///
    /// Returns the message id assigned by the sink.
    async fn send(&self, body: String, delay: Duration) -> Result<String, SinkError>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest<'a> {
    queue_url: &'a str,
    message_body: &'a str,
    delay_seconds: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageResponse {
    message_id: String,
}

/// SQS client for the audit queue.
#[derive(Clone)]
pub struct SqsSink {
    client: Client,
    endpoint: String,
    queue_url: String,
}

impl SqsSink {
    /// Create a new queue client.
    ///
    /// # Arguments
    ///
    /// * `queue_url` - Full URL of the audit queue
    /// * `endpoint` - Service endpoint; defaults to the queue URL's origin
    /// * `timeout` - Bound on each send, connect included
    ///
    /// # Errors
    ///
    /// Returns `SinkError::InvalidQueueUrl` if no endpoint can be derived from
    /// `queue_url`, or `SinkError::Client` if the HTTP client cannot be built.
    pub fn new(
        queue_url: String,
        endpoint: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => origin_of(&queue_url)?,
        };

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                error!(target: "ns.services.sink", error = %e, "Failed to build HTTP client");
                SinkError::Client(e.to_string())
            })?;

        Ok(Self {
            client,
            endpoint,
            queue_url,
        })
    }

    /// The endpoint messages are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn origin_of(queue_url: &str) -> Result<String, SinkError> {
    let url = Url::parse(queue_url).map_err(|e| SinkError::InvalidQueueUrl(e.to_string()))?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(SinkError::InvalidQueueUrl(format!(
            "'{queue_url}' has no host to send to"
        )));
    }
    Ok(origin.ascii_serialization())
}

#[async_trait]
impl MessageSink for SqsSink {
    #[instrument(skip_all, fields(body_bytes = body.len(), delay_secs = delay.as_secs()))]
    async fn send(&self, body: String, delay: Duration) -> Result<String, SinkError> {
        let request = SendMessageRequest {
            queue_url: &self.queue_url,
            message_body: &body,
            delay_seconds: delay.as_secs(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", SQS_TARGET_SEND_MESSAGE)
            .header("Content-Type", SQS_CONTENT_TYPE)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "ns.services.sink", error = %e, "Queue request failed");
                SinkError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "ns.services.sink", status = %status, "Queue rejected message");
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| SinkError::InvalidResponse(e.to_string()))?;

        debug!(target: "ns.services.sink", message_id = %parsed.message_id, "Message queued");
        Ok(parsed.message_id)
    }
}

/// Mock sinks for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// A message captured by [`RecordingSink`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentMessage {
        pub body: String,
        pub delay: Duration,
    }

    /// Sink that keeps every message it is given.
    ///
    /// With a latency set, each send sleeps before the message is kept, so a
    /// send cancelled during the sleep is counted as started but never kept.
    #[derive(Default)]
    pub struct RecordingSink {
        messages: Mutex<Vec<SentMessage>>,
        latency: Duration,
        started: AtomicUsize,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a sink that takes `latency` to accept each message.
        pub fn with_latency(latency: Duration) -> Self {
            Self {
                latency,
                ..Self::default()
            }
        }

        /// Sends begun so far, including ones that never completed.
        pub fn started_count(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        /// All messages sent so far, oldest first.
        pub fn messages(&self) -> Vec<SentMessage> {
            self.messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Message bodies parsed as JSON. Bodies that are not JSON are skipped.
        pub fn json_bodies(&self) -> Vec<serde_json::Value> {
            self.messages()
                .iter()
                .filter_map(|m| serde_json::from_str(&m.body).ok())
                .collect()
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, body: String, delay: Duration) -> Result<String, SinkError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let mut messages = self
                .messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            messages.push(SentMessage { body, delay });
            Ok(format!("mock-message-{}", messages.len()))
        }
    }

    /// Sink that is always unreachable.
    #[derive(Default)]
    pub struct FailingSink {
        call_count: AtomicUsize,
    }

    impl FailingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessageSink for FailingSink {
        async fn send(&self, _body: String, _delay: Duration) -> Result<String, SinkError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Err(SinkError::Transport("Mock sink unavailable".to_string()))
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_recording_sink_captures_messages() {
            let sink = RecordingSink::new();
            let id = sink
                .send(r#"{"a":1}"#.to_string(), Duration::from_secs(5))
                .await
                .unwrap();

            assert_eq!(id, "mock-message-1");
            assert_eq!(sink.call_count(), 1);
            assert_eq!(
                sink.messages(),
                vec![SentMessage {
                    body: r#"{"a":1}"#.to_string(),
                    delay: Duration::from_secs(5),
                }]
            );
            assert_eq!(sink.json_bodies()[0]["a"], 1);
            assert_eq!(sink.started_count(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_recording_sink_latency() {
            let sink = RecordingSink::with_latency(Duration::from_secs(8));
            let started = tokio::time::Instant::now();

            sink.send("{}".to_string(), Duration::ZERO).await.unwrap();

            assert!(started.elapsed() >= Duration::from_secs(8));
            assert_eq!(sink.call_count(), 1);
        }

        #[tokio::test]
        async fn test_failing_sink_counts_calls() {
            let sink = FailingSink::new();
            assert!(sink.send(String::new(), Duration::ZERO).await.is_err());
            assert!(sink.send(String::new(), Duration::ZERO).await.is_err());
            assert_eq!(sink.call_count(), 2);
        }
    }
}

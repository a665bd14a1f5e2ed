//! Service layer for the notification service.
//!
//! This module contains services that talk to external systems on behalf of
//! the authentication gate.
//!
//! # Components
//!
//! - `audit` - Builds audit records and hands them to the publisher
//! - `authority_client` - HTTP client for the identity authority
//! - `publisher` - Size-bounded, best-effort audit publishing
//! - `sink` - Audit queue client

pub mod audit;
pub mod authority_client;
pub mod publisher;
pub mod sink;

pub use audit::{AuditLogger, AuditRecorder};
pub use authority_client::{AuthorityClient, IdentityResolver, ResolveError};
pub use publisher::{BoundedMessagePublisher, PublishError, MAX_MESSAGE_BYTES};
pub use sink::{MessageSink, SinkError, SqsSink};

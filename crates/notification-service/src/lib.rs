//! Notification Service Library
//!
//! Inbound authentication and audit core of the notification service:
//!
//! - Bearer token verification against the identity authority's RSA key
//! - Identity resolution against the authority's profile endpoint
//! - A per-request authentication gate for protected routes
//! - One size-bounded audit message per gate decision, published to a queue
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/verifier.rs
//!                                     -> services/authority_client.rs
//!                                     -> services/audit.rs -> services/publisher.rs -> services/sink.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key loading, claims, token verification, principal
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication gate and HTTP metrics
//! - `models` - Audit record and response envelope
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Authority client, audit recorder, publisher, queue sink

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;

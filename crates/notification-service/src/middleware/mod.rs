//! Middleware for the notification service.
//!
//! # Components
//!
//! - `auth` - Authentication gate for protected routes
//! - `http_metrics` - HTTP request metrics

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState, PrincipalExt};
pub use http_metrics::http_metrics_middleware;

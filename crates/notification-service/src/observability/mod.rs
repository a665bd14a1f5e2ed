//! Observability module for the notification service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;

//! Metrics definitions for the notification service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ns_` prefix for the notification service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods only
//! - `endpoint`: the known routes plus `/other`
//! - `status`: 3 values for HTTP (success, error, timeout)
//! - `outcome`: one value per authentication decision
//! - audit publish `status`: sent, truncated_sent, failed

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("ns_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // The authority call dominates authenticated request latency
        .set_buckets_for_metric(
            Matcher::Prefix("ns_authority_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set authority request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `ns_http_requests_total`, `ns_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("ns_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("ns_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto a bounded set of endpoint labels
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the decision of the authentication gate
///
/// Metric: `ns_auth_decisions_total`
/// Labels: `outcome`
pub fn record_auth_decision(outcome: &'static str) {
    counter!("ns_auth_decisions_total", "outcome" => outcome).increment(1);
}

/// Record a profile lookup against the identity authority
///
/// Metric: `ns_authority_requests_total`, `ns_authority_request_duration_seconds`
/// Labels: `status`
pub fn record_authority_request(status: &'static str, duration: Duration) {
    histogram!("ns_authority_request_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("ns_authority_requests_total", "status" => status).increment(1);
}

// ============================================================================
// Audit Metrics
// ============================================================================

/// Record one audit publish attempt
///
/// Metric: `ns_audit_publish_total`
/// Labels: `status` (sent, truncated_sent, failed)
pub fn record_audit_publish(status: &'static str) {
    counter!("ns_audit_publish_total", "status" => status).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run against the no-op global recorder; they exercise the label
    // plumbing without asserting on values.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("GET", "/api/v1/me", 401, Duration::from_millis(10));
        record_http_request("GET", "/api/v1/me", 504, Duration::from_secs(30));
        record_http_request("GET", "/unknown", 404, Duration::from_millis(1));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/"), "/");
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/v1/me"), "/api/v1/me");
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/api/v1/me/extra"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/users/123"), "/other");
        assert_eq!(normalize_endpoint(""), "/other");
    }

    #[test]
    fn test_record_auth_and_audit_metrics() {
        record_auth_decision("authenticated");
        record_auth_decision("expired");
        record_authority_request("success", Duration::from_millis(40));
        record_authority_request("error", Duration::from_secs(30));
        record_audit_publish("sent");
        record_audit_publish("truncated_sent");
        record_audit_publish("failed");
    }
}

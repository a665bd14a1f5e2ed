//! Liveness probe.

/// Handler for GET /health
///
/// Returns "OK" while the process is serving. No dependency is checked.
pub async fn health_check() -> &'static str {
    "OK"
}

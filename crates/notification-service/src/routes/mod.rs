//! HTTP routes for the notification service.
//!
//! Defines the Axum router and application state.

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::services::audit::AuditLogger;
use crate::services::authority_client::IdentityResolver;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token verifier, built once at startup from the configured public key.
    pub verifier: Arc<TokenVerifier>,

    /// Identity authority lookup.
    pub resolver: Arc<dyn IdentityResolver>,

    /// Audit logger shared by every request.
    pub auditor: Arc<dyn AuditLogger>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - `/api/v1/me` - Current user endpoint - requires authentication
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout from [`Config::request_timeout`], long enough for a
///   gated request to finish its lookup and its audit
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = state.config.request_timeout();
    let auth_state = Arc::new(AuthState {
        verifier: state.verifier.clone(),
        resolver: state.resolver.clone(),
        auditor: state.auditor.clone(),
        lookup_timeout: Duration::from_secs(state.config.auth_api_timeout_seconds),
    });

    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Every route added here passes through the authentication gate
    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::audit::AuditRecorder;
    use crate::services::authority_client::mock::MockIdentityResolver;
    use crate::services::publisher::BoundedMessagePublisher;
    use crate::services::sink::mock::RecordingSink;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use notification_test_utils::{test_keypair, TestTokenBuilder};
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_app(sink: Arc<RecordingSink>) -> Router {
        test_app_with(
            MockIdentityResolver::for_email("test.user@example.com"),
            sink,
        )
    }

    fn test_app_with(resolver: MockIdentityResolver, sink: Arc<RecordingSink>) -> Router {
        let public_key = test_keypair(1).unwrap().public_key_base64();
        let config = Config::from_vars(&HashMap::from([
            ("JWT_PUBLIC_KEY".to_string(), public_key.clone()),
            ("AUTH_API_URL".to_string(), "http://auth.local".to_string()),
            (
                "AUDIT_QUEUE_URL".to_string(),
                "http://localhost:4566/000000000000/audit".to_string(),
            ),
        ]))
        .unwrap();

        let verifier =
            Arc::new(TokenVerifier::from_public_key(&public_key, Duration::ZERO).unwrap());
        let publisher = Arc::new(
            BoundedMessagePublisher::new(sink, Duration::from_secs(5))
                .with_send_timeout(Duration::from_secs(config.audit_queue_timeout_seconds)),
        );
        let state = Arc::new(AppState {
            config,
            verifier: verifier.clone(),
            resolver: Arc::new(resolver),
            auditor: Arc::new(AuditRecorder::new(verifier, publisher)),
        });

        build_routes(state, PrometheusBuilder::new().build_recorder().handle())
    }

    async fn get(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_public_routes_skip_the_gate() {
        let sink = Arc::new(RecordingSink::new());

        let (status, body) = get(test_app(sink.clone()), "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");

        let (status, _) = get(test_app(sink.clone()), "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn test_me_requires_authentication() {
        let sink = Arc::new(RecordingSink::new());
        let (status, body) = get(test_app(sink.clone()), "/api/v1/me", None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(sink.call_count(), 1);
    }

    #[tokio::test]
    async fn test_me_returns_principal() {
        let sink = Arc::new(RecordingSink::new());
        let token = TestTokenBuilder::new()
            .sign(&test_keypair(1).unwrap())
            .unwrap();

        let (status, body) = get(
            test_app(sink.clone()),
            "/api/v1/me",
            Some(&format!("Bearer {token}")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["email"], "test.user@example.com");
        assert_eq!(sink.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_authority_and_slow_audit_still_answer_401() {
        // Each stays under its own timeout (30s lookup, 10s send) while the
        // two together take 33s
        let sink = Arc::new(RecordingSink::with_latency(Duration::from_secs(8)));
        let resolver = MockIdentityResolver::unreachable("identity authority is overloaded")
            .with_latency(Duration::from_secs(25));
        let token = TestTokenBuilder::new()
            .sign(&test_keypair(1).unwrap())
            .unwrap();

        let (status, body) = get(
            test_app_with(resolver, sink.clone()),
            "/api/v1/me",
            Some(&format!("Bearer {token}")),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "identity authority is overloaded");
        assert_eq!(sink.started_count(), 1);
        assert_eq!(sink.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_authority_and_audit_finish_inside_request_timeout() {
        let sink = Arc::new(RecordingSink::with_latency(Duration::from_secs(3600)));
        let resolver = MockIdentityResolver::for_email("test.user@example.com")
            .with_latency(Duration::from_secs(3600));
        let token = TestTokenBuilder::new()
            .sign(&test_keypair(1).unwrap())
            .unwrap();

        let started = tokio::time::Instant::now();
        let (status, body) = get(
            test_app_with(resolver, sink.clone()),
            "/api/v1/me",
            Some(&format!("Bearer {token}")),
        )
        .await;

        // 30s lookup timeout, then the 10s send timeout, all under 45s
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(started.elapsed() >= Duration::from_secs(40));
        assert!(started.elapsed() < Duration::from_secs(45));
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(sink.started_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_audited() {
        let sink = Arc::new(RecordingSink::new());
        let (status, _) = get(test_app(sink.clone()), "/api/v1/unknown", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(sink.call_count(), 0);
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}

//! Test server harness for E2E testing
//!
//! Provides `TestNotificationServer` for spawning real notification service
//! instances in tests. Each server gets its own wiremock identity authority;
//! the audit sink is supplied by the test.

use crate::crypto_fixtures::test_keypair;
use metrics_exporter_prometheus::PrometheusBuilder;
use notification_service::auth::TokenVerifier;
use notification_service::config::Config;
use notification_service::routes::{self, AppState};
use notification_service::services::{
    AuditRecorder, AuthorityClient, BoundedMessagePublisher, MessageSink,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test harness for spawning the notification service in E2E tests.
///
/// Tokens signed with `test_keypair(1)` verify against the server.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_me_flow() -> Result<()> {
///     let sink = Arc::new(RecordingSink::new());
///     let server = TestNotificationServer::spawn(sink.clone()).await?;
///     server.mount_profile("user-42", "alice@example.com").await;
///
///     let token = TestTokenBuilder::new()
///         .for_user("user-42")
///         .with_email("alice@example.com")
///         .sign(&test_keypair(1)?)?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/api/v1/me", server.url()))
///         .bearer_auth(token)
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestNotificationServer {
    addr: SocketAddr,
    authority: MockServer,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestNotificationServer {
    /// Spawn a new test server instance.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Resolve identities against a fresh wiremock authority
    /// - Publish audit messages to `sink` with no visibility delay
    ///
    /// # Returns
    /// * `Ok(TestNotificationServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If server spawn fails
    pub async fn spawn(sink: Arc<dyn MessageSink>) -> Result<Self, anyhow::Error> {
        let authority = MockServer::start().await;
        let public_key = test_keypair(1)?.public_key_base64();

        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("JWT_PUBLIC_KEY".to_string(), public_key),
            ("AUTH_API_URL".to_string(), authority.uri()),
            ("AUTH_API_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            (
                "AUDIT_QUEUE_URL".to_string(),
                "http://localhost:4566/000000000000/test-audit".to_string(),
            ),
            ("AUDIT_QUEUE_DELAY_SECONDS".to_string(), "0".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let verifier = Arc::new(
            TokenVerifier::from_public_key(
                &vars["JWT_PUBLIC_KEY"],
                Duration::from_secs(config.jwt_clock_skew_seconds),
            )
            .map_err(|e| anyhow::anyhow!("Failed to load public key: {}", e))?,
        );

        let publisher = Arc::new(
            BoundedMessagePublisher::new(
                sink,
                Duration::from_secs(config.audit_queue_delay_seconds),
            )
            .with_send_timeout(Duration::from_secs(config.audit_queue_timeout_seconds)),
        );

        let resolver = Arc::new(
            AuthorityClient::new(
                &config.auth_api_url,
                Duration::from_secs(config.auth_api_timeout_seconds),
            )
            .map_err(|e| anyhow::anyhow!("Failed to create authority client: {}", e))?,
        );

        let state = Arc::new(AppState {
            config: config.clone(),
            verifier: verifier.clone(),
            resolver,
            auditor: Arc::new(AuditRecorder::new(verifier, publisher)),
        });

        // The global recorder can only be installed once per process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            authority,
            config,
            _handle: handle,
        })
    }

    /// The wiremock identity authority, for mounting custom responses.
    pub fn authority(&self) -> &MockServer {
        &self.authority
    }

    /// Make the authority resolve every lookup to the given user.
    pub async fn mount_profile(&self, user_id: &str, email: &str) {
        Mock::given(method("GET"))
            .and(path("/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Profile retrieved",
                "data": {
                    "userId": user_id,
                    "email": email,
                    "username": "Test User",
                    "role": "USER"
                }
            })))
            .mount(&self.authority)
            .await;
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestNotificationServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}

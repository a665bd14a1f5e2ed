//! Notification Service
//!
//! Entry point. Loads configuration, builds the token verifier from the
//! configured public key and serves the HTTP API. An unusable public key
//! stops startup.

use anyhow::Context;
use common::secret::ExposeSecret;
use notification_service::auth::TokenVerifier;
use notification_service::config::Config;
use notification_service::observability::metrics::init_metrics_recorder;
use notification_service::routes::{self, AppState};
use notification_service::services::{
    AuditRecorder, AuthorityClient, BoundedMessagePublisher, SqsSink,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notification_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Notification Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        auth_api_url = %config.auth_api_url,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        audit_queue_delay_seconds = config.audit_queue_delay_seconds,
        request_timeout_seconds = config.request_timeout().as_secs(),
        "Configuration loaded successfully"
    );

    // The public key is parsed exactly once; there is no degraded mode without it
    let verifier = Arc::new(
        TokenVerifier::from_public_key(
            config.jwt_public_key.expose_secret(),
            Duration::from_secs(config.jwt_clock_skew_seconds),
        )
        .map_err(|e| {
            error!("Failed to load JWT public key: {}", e);
            e
        })
        .context("JWT_PUBLIC_KEY is not a usable RSA public key")?,
    );

    info!("JWT public key loaded");

    let sink = SqsSink::new(
        config.audit_queue_url.clone(),
        config.audit_queue_endpoint.clone(),
        Duration::from_secs(config.audit_queue_timeout_seconds),
    )
    .map_err(|e| {
        error!("Failed to create audit queue client: {}", e);
        e
    })?;

    info!(endpoint = %sink.endpoint(), "Audit queue client ready");

    let publisher = Arc::new(
        BoundedMessagePublisher::new(
            Arc::new(sink),
            Duration::from_secs(config.audit_queue_delay_seconds),
        )
        .with_send_timeout(Duration::from_secs(config.audit_queue_timeout_seconds)),
    );
    let auditor = Arc::new(AuditRecorder::new(verifier.clone(), publisher));

    let resolver = Arc::new(
        AuthorityClient::new(
            &config.auth_api_url,
            Duration::from_secs(config.auth_api_timeout_seconds),
        )
        .context("Failed to create identity authority client")?,
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        anyhow::anyhow!(e)
    })?;

    // Parse bind address before moving config
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        config,
        verifier,
        resolver,
        auditor,
    });

    let app = routes::build_routes(state, metrics_handle);

    info!("Notification Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Notification Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

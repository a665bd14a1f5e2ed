//! Notification service configuration.
//!
//! Configuration is loaded from environment variables. The public key is
//! held as a secret and redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{SecretString, REDACTED};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default timeout for identity authority lookups, in seconds.
pub const DEFAULT_AUTH_API_TIMEOUT_SECONDS: u64 = 30;

/// Largest accepted identity authority timeout, in seconds.
pub const MAX_AUTH_API_TIMEOUT_SECONDS: u64 = 60;

/// Default visibility delay for audit messages, in seconds.
pub const DEFAULT_AUDIT_QUEUE_DELAY_SECONDS: u64 = 5;

/// Largest visibility delay the queue accepts, in seconds.
pub const MAX_AUDIT_QUEUE_DELAY_SECONDS: u64 = 900;

/// Default timeout for audit queue sends, in seconds.
pub const DEFAULT_AUDIT_QUEUE_TIMEOUT_SECONDS: u64 = 10;

/// Largest accepted audit queue timeout, in seconds.
pub const MAX_AUDIT_QUEUE_TIMEOUT_SECONDS: u64 = 60;

/// Time left for token checks and response writing once the authority lookup
/// and the audit send have used their full timeouts.
pub const REQUEST_TIMEOUT_MARGIN_SECONDS: u64 = 5;

/// Notification service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Base64 or PEM encoded RSA public key of the identity authority.
    pub jwt_public_key: SecretString,

    /// Clock skew tolerance applied to token expiry, in seconds.
    pub jwt_clock_skew_seconds: u64,

    /// Identity authority base URL, trimmed and without a trailing slash.
    pub auth_api_url: String,

    /// Connect and request timeout for authority lookups, in seconds.
    pub auth_api_timeout_seconds: u64,

    /// URL of the audit queue.
    pub audit_queue_url: String,

    /// Queue service endpoint. `None` means the queue URL's origin.
    pub audit_queue_endpoint: Option<String>,

    /// Visibility delay applied to each audit message, in seconds.
    pub audit_queue_delay_seconds: u64,

    /// Timeout for each audit send, in seconds.
    pub audit_queue_timeout_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt_public_key", &REDACTED)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("auth_api_url", &self.auth_api_url)
            .field("auth_api_timeout_seconds", &self.auth_api_timeout_seconds)
            .field("audit_queue_url", &self.audit_queue_url)
            .field("audit_queue_endpoint", &self.audit_queue_endpoint)
            .field("audit_queue_delay_seconds", &self.audit_queue_delay_seconds)
            .field(
                "audit_queue_timeout_seconds",
                &self.audit_queue_timeout_seconds,
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid audit queue delay configuration: {0}")]
    InvalidQueueDelay(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt_public_key = required(vars, "JWT_PUBLIC_KEY")?;

        let jwt_clock_skew_seconds = parse_seconds(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
            0..=MAX_CLOCK_SKEW.as_secs(),
            ConfigError::InvalidJwtClockSkew,
        )?;

        let auth_api_url = required(vars, "AUTH_API_URL")?
            .trim_end_matches('/')
            .to_string();

        let auth_api_timeout_seconds = parse_seconds(
            vars,
            "AUTH_API_TIMEOUT_SECONDS",
            DEFAULT_AUTH_API_TIMEOUT_SECONDS,
            1..=MAX_AUTH_API_TIMEOUT_SECONDS,
            ConfigError::InvalidTimeout,
        )?;

        let audit_queue_url = required(vars, "AUDIT_QUEUE_URL")?;

        let audit_queue_endpoint = vars
            .get("AUDIT_QUEUE_ENDPOINT")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let audit_queue_delay_seconds = parse_seconds(
            vars,
            "AUDIT_QUEUE_DELAY_SECONDS",
            DEFAULT_AUDIT_QUEUE_DELAY_SECONDS,
            0..=MAX_AUDIT_QUEUE_DELAY_SECONDS,
            ConfigError::InvalidQueueDelay,
        )?;

        let audit_queue_timeout_seconds = parse_seconds(
            vars,
            "AUDIT_QUEUE_TIMEOUT_SECONDS",
            DEFAULT_AUDIT_QUEUE_TIMEOUT_SECONDS,
            1..=MAX_AUDIT_QUEUE_TIMEOUT_SECONDS,
            ConfigError::InvalidTimeout,
        )?;

        Ok(Config {
            bind_address,
            jwt_public_key: SecretString::from(jwt_public_key),
            jwt_clock_skew_seconds,
            auth_api_url,
            auth_api_timeout_seconds,
            audit_queue_url,
            audit_queue_endpoint,
            audit_queue_delay_seconds,
            audit_queue_timeout_seconds,
        })
    }

    /// Upper bound on a whole request.
    ///
    /// A gated request may wait on one authority lookup and one audit send,
    /// each bounded by its own timeout, so the request timeout covers both
    /// plus [`REQUEST_TIMEOUT_MARGIN_SECONDS`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.auth_api_timeout_seconds
                + self.audit_queue_timeout_seconds
                + REQUEST_TIMEOUT_MARGIN_SECONDS,
        )
    }
}

/// A required variable, trimmed. Blank counts as missing.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    allowed: RangeInclusive<u64>,
    invalid: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        invalid(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if !allowed.contains(&value) {
        return Err(invalid(format!(
            "{} must be between {} and {} seconds, got {}",
            name,
            allowed.start(),
            allowed.end(),
            value
        )));
    }

    Ok(value)
}

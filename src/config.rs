use std::time::Duration;

use crate::client::TaskStoreConfig;
use crate::error::{AnalyticsError, Result};
use crate::resilience::CircuitBreakerConfig;

/// Complete runtime configuration for the analytics core
///
/// Defaults match the deployed environment; every field can be overridden
/// through environment variables via [`AnalyticsConfig::from_env`].
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    pub task_store: TaskStoreSettings,
    pub breaker: BreakerSettings,
    pub stream: StreamSettings,
    pub auth: AuthSettings,
}

/// Pull-path connection settings
#[derive(Debug, Clone)]
pub struct TaskStoreSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for TaskStoreSettings {
    fn default() -> Self {
        Self {
            base_url: "http://nginx-lb".to_string(),
            request_timeout_ms: 5000,
            retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub success_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 30000,
            success_threshold: 2,
        }
    }
}

/// Push-path stream settings
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub broker_url: String,
    pub group_id: String,
    pub enabled: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            broker_url: "kafka:9092".to_string(),
            group_id: "analytics-service-group".to_string(),
            enabled: false,
        }
    }
}

/// Service-to-service credential material
///
/// The core only attaches `service_token` to outbound requests; the secret
/// and issuer are carried for the external identity layer that mints
/// tokens, issuance itself happens outside this crate.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub service_token: String,
    pub token_secret: String,
    pub token_issuer: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            service_token: String::new(),
            token_secret: "mi_clave_secreta_jwt_super_segura_2024".to_string(),
            token_issuer: "analytics-service".to_string(),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("TASKS_SERVICE_URL") {
            config.task_store.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("TASKS_REQUEST_TIMEOUT_MS") {
            config.task_store.request_timeout_ms = timeout.parse().map_err(|e| {
                AnalyticsError::ConfigurationError(format!("Invalid request_timeout_ms: {e}"))
            })?;
        }

        if let Ok(retries) = std::env::var("TASKS_FETCH_RETRIES") {
            config.task_store.retries = retries
                .parse()
                .map_err(|e| AnalyticsError::ConfigurationError(format!("Invalid retries: {e}")))?;
        }

        if let Ok(delay) = std::env::var("TASKS_RETRY_BASE_DELAY_MS") {
            config.task_store.retry_base_delay_ms = delay.parse().map_err(|e| {
                AnalyticsError::ConfigurationError(format!("Invalid retry_base_delay_ms: {e}"))
            })?;
        }

        if let Ok(threshold) = std::env::var("BREAKER_FAILURE_THRESHOLD") {
            config.breaker.failure_threshold = threshold.parse().map_err(|e| {
                AnalyticsError::ConfigurationError(format!("Invalid failure_threshold: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("BREAKER_RESET_TIMEOUT_MS") {
            config.breaker.reset_timeout_ms = timeout.parse().map_err(|e| {
                AnalyticsError::ConfigurationError(format!("Invalid reset_timeout_ms: {e}"))
            })?;
        }

        if let Ok(threshold) = std::env::var("BREAKER_SUCCESS_THRESHOLD") {
            config.breaker.success_threshold = threshold.parse().map_err(|e| {
                AnalyticsError::ConfigurationError(format!("Invalid success_threshold: {e}"))
            })?;
        }

        if let Ok(broker_url) = std::env::var("EVENT_BROKER_URL") {
            config.stream.broker_url = broker_url;
        }

        if let Ok(group_id) = std::env::var("EVENT_STREAM_GROUP_ID") {
            config.stream.group_id = group_id;
        }

        if let Ok(enabled) = std::env::var("EVENT_STREAM_ENABLED") {
            config.stream.enabled = enabled == "true";
        }

        if let Ok(token) = std::env::var("SERVICE_AUTH_TOKEN") {
            config.auth.service_token = token;
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.auth.token_secret = secret;
        }

        if let Ok(issuer) = std::env::var("SERVICE_TOKEN_ISSUER") {
            config.auth.token_issuer = issuer;
        }

        Ok(config)
    }

    /// Client-level view of the pull-path settings, credential attached.
    pub fn task_store_client_config(&self) -> TaskStoreConfig {
        TaskStoreConfig {
            base_url: self.task_store.base_url.clone(),
            timeout_ms: self.task_store.request_timeout_ms,
            retries: self.task_store.retries,
            retry_base_delay_ms: self.task_store.retry_base_delay_ms,
            bearer_token: self.auth.service_token.clone(),
        }
    }

    /// Breaker-level view of the threshold settings.
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            reset_timeout: Duration::from_millis(self.breaker.reset_timeout_ms),
            success_threshold: self.breaker.success_threshold,
        }
    }
}

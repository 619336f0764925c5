//! # Task Store Client
//!
//! Resilient HTTP access to the remote task store. The client composes the
//! two resilience layers around a pluggable transport seam:
//!
//! ```text
//! CircuitBreaker -> RetryExecutor -> TaskFetcher (HTTP)
//! ```
//!
//! One full retry run is a single breaker-visible operation, so the breaker
//! counts exhausted runs, not individual attempts. When the breaker is open
//! the transport is never touched and callers get a fast
//! [`FetchError::CircuitOpen`].

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::AnalyticsError;
use crate::models::TaskRecord;
use crate::resilience::{
    AttemptError, BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError,
    CircuitState, RetryExecutor, RetryPolicy,
};

/// Connection settings for the remote task store
#[derive(Debug, Clone)]
pub struct TaskStoreConfig {
    /// Base URL of the store, e.g. "<http://nginx-lb>"
    pub base_url: String,
    /// Per-attempt request budget in milliseconds
    pub timeout_ms: u64,
    /// Additional attempts after the first failure
    pub retries: u32,
    /// Backoff before the first retry, in milliseconds; doubles per retry
    pub retry_base_delay_ms: u64,
    /// Pre-issued service credential; empty means no Authorization header
    pub bearer_token: String,
}

impl Default for TaskStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://nginx-lb".to_string(),
            timeout_ms: 5000,
            retries: 3,
            retry_base_delay_ms: 1000,
            bearer_token: String::new(),
        }
    }
}

/// A single attempt against the task store went wrong
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure, DNS, refused, reset, and friends
    #[error("Task store request failed: {message}")]
    Request { message: String },

    /// The store answered with a non-success status
    #[error("Task store returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// The response body was not a task list
    #[error("Failed to decode task store response: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            TransportError::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            TransportError::Request {
                message: err.to_string(),
            }
        }
    }
}

/// What a `fetch_tasks` call ultimately surfaced to the read path
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The breaker rejected the call before any network activity
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen {
        component: String,
        state: CircuitState,
    },

    /// Every attempt ran into its per-attempt timeout
    #[error("Task store timed out after {attempts} attempts ({timeout_ms}ms per attempt)")]
    UpstreamTimeout { attempts: u32, timeout_ms: u64 },

    /// Retries exhausted; carries the final attempt's cause
    #[error("Task store unavailable after {attempts} attempts: {source}")]
    Upstream {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

impl FetchError {
    /// Breaker state to report alongside this failure, when it carries one.
    pub fn circuit_state(&self) -> Option<CircuitState> {
        match self {
            FetchError::CircuitOpen { state, .. } => Some(*state),
            _ => None,
        }
    }
}

/// Transport seam for fetching the task list
///
/// Production uses [`HttpTaskFetcher`]; tests swap in scripted fakes.
#[async_trait]
pub trait TaskFetcher: Send + Sync {
    async fn fetch_tasks(&self) -> Result<Vec<TaskRecord>, TransportError>;
}

/// HTTP implementation of [`TaskFetcher`] against `GET /api/tasks`
pub struct HttpTaskFetcher {
    client: Client,
    endpoint: Url,
}

impl HttpTaskFetcher {
    pub fn new(config: &TaskStoreConfig) -> crate::error::Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AnalyticsError::ConfigurationError(format!("Invalid task store base URL: {e}"))
        })?;
        let endpoint = base_url.join("/api/tasks").map_err(|e| {
            AnalyticsError::ConfigurationError(format!("Failed to construct URL: {e}"))
        })?;

        let mut client_builder = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("analytics-core/{}", env!("CARGO_PKG_VERSION")));

        // Attach the pre-issued service credential when one is configured
        if !config.bearer_token.is_empty() {
            let mut default_headers = reqwest::header::HeaderMap::new();
            default_headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", config.bearer_token)
                    .parse()
                    .map_err(|e| {
                        AnalyticsError::ConfigurationError(format!("Invalid bearer token: {e}"))
                    })?,
            );
            client_builder = client_builder.default_headers(default_headers);

            debug!("Configured Bearer token authentication for task store");
        }

        let client = client_builder.build().map_err(|e| {
            AnalyticsError::ConfigurationError(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl TaskFetcher for HttpTaskFetcher {
    async fn fetch_tasks(&self) -> Result<Vec<TaskRecord>, TransportError> {
        debug!(url = %self.endpoint, "Fetching tasks from task store");

        let response = self.client.get(self.endpoint.clone()).send().await?;
        let response = response.error_for_status()?;
        let tasks = response.json::<Vec<TaskRecord>>().await?;

        debug!(count = tasks.len(), "Fetched task list from store");
        Ok(tasks)
    }
}

/// Circuit-broken, retrying client for the remote task store
pub struct TaskStoreClient {
    fetcher: Arc<dyn TaskFetcher>,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
}

impl std::fmt::Debug for TaskStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStoreClient")
            .field("breaker", &self.breaker.state())
            .field("retry", &self.retry.policy())
            .finish()
    }
}

impl TaskStoreClient {
    /// Build a client with the production HTTP transport.
    pub fn new(
        config: &TaskStoreConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> crate::error::Result<Self> {
        let fetcher = Arc::new(HttpTaskFetcher::new(config)?);
        Ok(Self::with_fetcher(fetcher, config, breaker_config))
    }

    /// Build a client over a custom transport; the seam tests use.
    pub fn with_fetcher(
        fetcher: Arc<dyn TaskFetcher>,
        config: &TaskStoreConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let retry = RetryExecutor::new(
            "fetch-tasks",
            RetryPolicy {
                retries: config.retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
                attempt_timeout: Duration::from_millis(config.timeout_ms),
            },
        );
        let breaker = CircuitBreaker::new("task-store", breaker_config);

        Self {
            fetcher,
            breaker,
            retry,
        }
    }

    /// Fetch the current task list through both resilience layers.
    ///
    /// An empty list is a success; only transport-level trouble is an error.
    pub async fn fetch_tasks(&self) -> Result<Vec<TaskRecord>, FetchError> {
        let fetcher = Arc::clone(&self.fetcher);
        let retry = &self.retry;

        let outcome = self
            .breaker
            .call(|| {
                retry.execute(move || {
                    let fetcher = Arc::clone(&fetcher);
                    async move { fetcher.fetch_tasks().await }
                })
            })
            .await;

        match outcome {
            Ok(tasks) => Ok(tasks),
            Err(CircuitBreakerError::CircuitOpen { component, state }) => {
                Err(FetchError::CircuitOpen { component, state })
            }
            Err(CircuitBreakerError::OperationFailed(retry_err)) => match retry_err.last {
                AttemptError::TimedOut { timeout_ms } => Err(FetchError::UpstreamTimeout {
                    attempts: retry_err.attempts,
                    timeout_ms,
                }),
                AttemptError::Failed(source) => Err(FetchError::Upstream {
                    attempts: retry_err.attempts,
                    source,
                }),
            },
        }
    }

    /// Current breaker state
    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Breaker bookkeeping snapshot for status payloads
    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    /// Manually force the breaker closed
    pub fn reset_breaker(&self) {
        self.breaker.reset();
    }
}

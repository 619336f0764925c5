#![allow(clippy::doc_markdown)] // Allow technical terms like HalfOpen, camelCase in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Analytics Core
//!
//! Resilient task-statistics engine combining two independent acquisition
//! paths over the same task domain.
//!
//! ## Overview
//!
//! The **pull path** fetches the live task list over HTTP on demand; every
//! fetch runs through a retry executor with exponential backoff, and the
//! whole retry run counts as one operation against a circuit breaker, so a
//! struggling upstream is probed instead of hammered. The **push path**
//! subscribes to the task lifecycle topics and keeps a materialized
//! statistics snapshot plus a bounded event history that readers get in
//! constant time.
//!
//! ## Architecture
//!
//! [`analytics::AnalyticsRuntime`] is the composition root: it builds the
//! resilient [`client::TaskStoreClient`], the shared
//! [`stats::StatsAggregator`], and (when the stream is enabled) the
//! [`messaging::EventIngestor`]. The [`analytics::AnalyticsService`] facade
//! answers every read; upstream trouble degrades the payload rather than
//! erroring, and the combined view reads both paths concurrently with
//! failures isolated per side.
//!
//! ## Key Features
//!
//! - **Circuit breaker**: consecutive-failure tripping, lazy half-open
//!   probing after a reset timeout, manual reset
//! - **Bounded retries**: per-attempt timeouts and exponential backoff with
//!   an explicit attempt counter
//! - **Materialized statistics**: `total == completed + pending` after every
//!   applied event, whatever the event order
//! - **Bounded history**: the newest 100 events, served newest first
//! - **Degraded answers**: readers always get a payload naming the breaker
//!   state, never a bare error
//!
//! ## Module Organization
//!
//! - [`analytics`] - Read facade and the runtime composition root
//! - [`client`] - Resilient HTTP client for the task store
//! - [`config`] - Environment-driven configuration
//! - [`constants`] - Stream topics, event tags, system defaults
//! - [`error`] - Structured error handling
//! - [`events`] - Wire-format task events and their kinds
//! - [`health`] - Liveness payload
//! - [`logging`] - Structured logging bootstrap
//! - [`messaging`] - Event source seam, in-process bus, ingestion loop
//! - [`models`] - Task records and the priority vocabulary
//! - [`resilience`] - Circuit breaker and retry executor
//! - [`stats`] - Statistics aggregator and snapshot types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use analytics_core::analytics::AnalyticsRuntime;
//! use analytics_core::config::AnalyticsConfig;
//! use analytics_core::messaging::InProcessEventBus;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnalyticsConfig::from_env()?;
//! let bus = InProcessEventBus::default();
//!
//! let runtime = AnalyticsRuntime::start(&config, &bus).await?;
//! let service = runtime.service();
//!
//! let combined = service.combined_stats().await;
//! println!(
//!     "pull ready: {}, push ready: {}",
//!     combined.pull.is_ready(),
//!     combined.push.is_ready()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, including the integration suites
//! ```

pub mod analytics;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod health;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod resilience;
pub mod stats;

pub use analytics::{
    AnalyticsRuntime, AnalyticsService, CombinedStats, PullOutcome, PullStats, PushStats,
    TasksByPriorityOutcome,
};
pub use client::{FetchError, TaskFetcher, TaskStoreClient, TaskStoreConfig};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
pub use events::{TaskEvent, TaskEventKind};
pub use health::HealthReport;
pub use messaging::{EventIngestor, EventSource, InProcessEventBus, StreamError};
pub use models::{PriorityBreakdown, TaskPriority, TaskRecord};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryExecutor, RetryPolicy,
};
pub use stats::{StatsAggregator, TaskStats};

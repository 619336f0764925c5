//! # Analytics Facade
//!
//! The read surface over both statistics paths:
//!
//! - **Pull**: on-demand task fetches through [`TaskStoreClient`], summarized
//!   into completion and priority figures at read time.
//! - **Push**: the materialized view a running [`EventIngestor`] keeps inside
//!   a shared [`StatsAggregator`].
//!
//! Every facade method answers; upstream trouble turns into a degraded
//! payload that names the circuit breaker state instead of an `Err`. The
//! combined view reads both paths concurrently and isolates a failure on one
//! side from the other.
//!
//! [`AnalyticsRuntime`] is the composition root: it wires the client, the
//! aggregator, and (when enabled) the event ingestor, and survives a stream
//! that refuses to start.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::client::TaskStoreClient;
use crate::config::AnalyticsConfig;
use crate::constants::system::DEFAULT_HISTORY_LIMIT;
use crate::events::TaskEvent;
use crate::messaging::{EventIngestor, EventSource, IngestorHandle};
use crate::models::{PriorityBreakdown, TaskPriority, TaskRecord};
use crate::resilience::{BreakerStatus, CircuitState};
use crate::stats::{StatsAggregator, TaskStats};

/// Fixed source note on the pull side of a combined payload.
pub const PULL_SOURCE: &str = "On-demand fetch from the task store over HTTP";

/// Fixed source note on the push side of a combined payload.
pub const PUSH_SOURCE: &str = "Materialized in memory from the task event stream";

/// Upstream statistics summarized from a live task fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub by_priority: PriorityBreakdown,
    /// Percentage with two decimals, `"0%"` when there are no tasks.
    pub completion_rate: String,
    pub circuit_breaker_state: CircuitState,
    pub timestamp: DateTime<Utc>,
}

/// Substitute payload when the upstream fetch fails.
///
/// Callers still get an answer; `error` is a fixed description and `message`
/// carries the concrete cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedStats {
    pub error: String,
    pub message: String,
    pub circuit_breaker_state: CircuitState,
    pub timestamp: DateTime<Utc>,
}

/// What a pull-path read produced: live figures or a degraded substitute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PullOutcome {
    Available(PullStats),
    Degraded(DegradedStats),
}

impl PullOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, PullOutcome::Available(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PullOutcome::Degraded(_))
    }
}

/// Statistics materialized from the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub by_priority: PriorityBreakdown,
    pub completion_rate: String,
    pub last_update: DateTime<Utc>,
    pub events_in_history: usize,
    pub timestamp: DateTime<Utc>,
}

/// Tasks grouped into the known priority buckets.
///
/// Tasks with a priority outside the vocabulary are left out of the groups,
/// matching how the snapshot counts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksByPriority {
    pub high: Vec<TaskRecord>,
    pub medium: Vec<TaskRecord>,
    pub low: Vec<TaskRecord>,
    pub summary: PriorityBreakdown,
    pub circuit_breaker_state: CircuitState,
}

/// What a grouped read produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TasksByPriorityOutcome {
    Grouped(TasksByPriority),
    Degraded(DegradedStats),
}

impl TasksByPriorityOutcome {
    pub fn is_grouped(&self) -> bool {
        matches!(self, TasksByPriorityOutcome::Grouped(_))
    }
}

/// One side of a combined payload: a fixed source note plus either the
/// figures or the failure that replaced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSection<T> {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> StatsSection<T> {
    fn ready(source: &str, stats: T) -> Self {
        Self {
            source: source.to_string(),
            stats: Some(stats),
            error: None,
        }
    }

    fn failed(source: &str, error: String) -> Self {
        Self {
            source: source.to_string(),
            stats: None,
            error: Some(error),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.stats.is_some()
    }
}

/// Both statistics paths side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedStats {
    pub pull: StatsSection<PullStats>,
    pub push: StatsSection<PushStats>,
    pub timestamp: DateTime<Utc>,
}

/// Circuit breaker status payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerReport {
    #[serde(flatten)]
    pub status: BreakerStatus,
    pub timestamp: DateTime<Utc>,
}

/// Confirmation payload for a manual breaker reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerResetReport {
    pub message: String,
    pub state: CircuitState,
    pub timestamp: DateTime<Utc>,
}

fn completion_rate(completed: u64, total: u64) -> String {
    if total > 0 {
        format!("{:.2}%", (completed as f64 / total as f64) * 100.0)
    } else {
        "0%".to_string()
    }
}

/// The analytics read surface.
///
/// Holds the resilient task store client and a shared handle on the
/// aggregator the ingestor writes into. Methods never fail; degradation is
/// part of the payload.
#[derive(Debug)]
pub struct AnalyticsService {
    client: TaskStoreClient,
    aggregator: Arc<StatsAggregator>,
}

impl AnalyticsService {
    pub fn new(client: TaskStoreClient, aggregator: Arc<StatsAggregator>) -> Self {
        Self { client, aggregator }
    }

    /// Fetch the task list and summarize it.
    ///
    /// An upstream failure degrades the payload instead of erroring; the
    /// breaker state in either shape tells callers how the pull path is
    /// doing.
    pub async fn pull_stats(&self) -> PullOutcome {
        info!("📊 Fetching statistics from the task store");

        match self.client.fetch_tasks().await {
            Ok(tasks) => {
                let stats = self.summarize(&tasks);
                info!(total = stats.total, "Statistics calculated");
                PullOutcome::Available(stats)
            }
            Err(e) => {
                error!(error = %e, "❌ Failed to fetch statistics from the task store");
                PullOutcome::Degraded(DegradedStats {
                    error: "Failed to fetch statistics from Tasks Service".to_string(),
                    message: e.to_string(),
                    circuit_breaker_state: self.client.breaker_state(),
                    timestamp: Utc::now(),
                })
            }
        }
    }

    /// Read the materialized view the event stream maintains.
    pub fn push_stats(&self) -> PushStats {
        let TaskStats {
            total,
            completed,
            pending,
            by_priority,
            last_update,
        } = self.aggregator.stats();

        PushStats {
            completion_rate: completion_rate(completed, total),
            total,
            completed,
            pending,
            by_priority,
            last_update,
            events_in_history: self.aggregator.history_len(),
            timestamp: Utc::now(),
        }
    }

    /// Read both paths concurrently.
    ///
    /// The sections fail independently: a dead upstream leaves the push side
    /// intact, and each carries a fixed note naming how its figures were
    /// acquired.
    pub async fn combined_stats(&self) -> CombinedStats {
        let (pull, push) = tokio::join!(self.pull_stats(), async { self.push_stats() });

        let pull = match pull {
            PullOutcome::Available(stats) => StatsSection::ready(PULL_SOURCE, stats),
            PullOutcome::Degraded(degraded) => StatsSection::failed(PULL_SOURCE, degraded.message),
        };

        CombinedStats {
            pull,
            push: StatsSection::ready(PUSH_SOURCE, push),
            timestamp: Utc::now(),
        }
    }

    /// Fetch the task list and group it by priority.
    pub async fn tasks_by_priority(&self) -> TasksByPriorityOutcome {
        info!("📋 Fetching tasks by priority from the task store");

        match self.client.fetch_tasks().await {
            Ok(tasks) => {
                let mut grouped = TasksByPriority {
                    high: Vec::new(),
                    medium: Vec::new(),
                    low: Vec::new(),
                    summary: PriorityBreakdown::default(),
                    circuit_breaker_state: self.client.breaker_state(),
                };

                for task in tasks {
                    match task.parsed_priority() {
                        Some(TaskPriority::High) => {
                            grouped.summary.high += 1;
                            grouped.high.push(task);
                        }
                        Some(TaskPriority::Medium) => {
                            grouped.summary.medium += 1;
                            grouped.medium.push(task);
                        }
                        Some(TaskPriority::Low) => {
                            grouped.summary.low += 1;
                            grouped.low.push(task);
                        }
                        None => {
                            debug!(
                                task_id = %task.id,
                                priority = %task.priority,
                                "Task priority outside the known vocabulary, leaving it ungrouped"
                            );
                        }
                    }
                }

                TasksByPriorityOutcome::Grouped(grouped)
            }
            Err(e) => {
                error!(error = %e, "❌ Failed to fetch tasks by priority from the task store");
                TasksByPriorityOutcome::Degraded(DegradedStats {
                    error: "Failed to fetch tasks by priority from Tasks Service".to_string(),
                    message: e.to_string(),
                    circuit_breaker_state: self.client.breaker_state(),
                    timestamp: Utc::now(),
                })
            }
        }
    }

    /// Recent stream events, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`] and is capped by how
    /// much history the aggregator retains.
    pub fn event_history(&self, limit: Option<usize>) -> Vec<TaskEvent> {
        self.aggregator
            .event_history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
    }

    /// Current breaker state and streak counters.
    pub fn circuit_breaker_status(&self) -> BreakerReport {
        BreakerReport {
            status: self.client.breaker_status(),
            timestamp: Utc::now(),
        }
    }

    /// Force the breaker closed and confirm the resulting state.
    pub fn reset_circuit_breaker(&self) -> BreakerResetReport {
        self.client.reset_breaker();
        BreakerResetReport {
            message: "Circuit breaker reset successfully".to_string(),
            state: self.client.breaker_state(),
            timestamp: Utc::now(),
        }
    }

    fn summarize(&self, tasks: &[TaskRecord]) -> PullStats {
        let total = tasks.len() as u64;
        let completed = tasks.iter().filter(|t| t.completed).count() as u64;
        let pending = total - completed;

        let mut by_priority = PriorityBreakdown::default();
        for task in tasks {
            if let Some(priority) = task.parsed_priority() {
                *by_priority.bucket_mut(priority) += 1;
            }
        }

        PullStats {
            total,
            completed,
            pending,
            by_priority,
            completion_rate: completion_rate(completed, total),
            circuit_breaker_state: self.client.breaker_state(),
            timestamp: Utc::now(),
        }
    }
}

/// Composition root for the whole analytics core.
///
/// Builds the client and aggregator from configuration and, when the stream
/// is enabled, starts the ingestor. A stream that fails to start is logged
/// and left inactive; the pull path keeps serving.
pub struct AnalyticsRuntime {
    service: Arc<AnalyticsService>,
    aggregator: Arc<StatsAggregator>,
    ingestor_handle: Option<IngestorHandle>,
}

impl AnalyticsRuntime {
    pub async fn start(
        config: &AnalyticsConfig,
        source: &dyn EventSource,
    ) -> crate::error::Result<Self> {
        info!("🚀 Starting analytics runtime");

        let aggregator = Arc::new(StatsAggregator::new());
        let client = TaskStoreClient::new(&config.task_store_client_config(), config.breaker_config())?;
        let service = Arc::new(AnalyticsService::new(client, Arc::clone(&aggregator)));

        let ingestor_handle = if config.stream.enabled {
            match EventIngestor::new(Arc::clone(&aggregator)).start(source).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!(
                        error = %e,
                        "❌ Event stream startup failed, continuing without the push path"
                    );
                    None
                }
            }
        } else {
            info!("Event stream disabled, push path inactive");
            None
        };

        Ok(Self {
            service,
            aggregator,
            ingestor_handle,
        })
    }

    /// Shared handle on the read surface.
    pub fn service(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.service)
    }

    /// Shared handle on the aggregator, for embedders that apply events
    /// directly or reset the materialized view.
    pub fn aggregator(&self) -> Arc<StatsAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Whether the ingestor is alive and consuming.
    pub fn push_path_active(&self) -> bool {
        self.ingestor_handle
            .as_ref()
            .map(|handle| handle.is_running())
            .unwrap_or(false)
    }

    /// Stop the ingestor, waiting up to `timeout` for the loop to drain.
    pub async fn shutdown(mut self, timeout: Duration) -> crate::error::Result<()> {
        info!("🛑 Stopping analytics runtime");
        if let Some(handle) = self.ingestor_handle.take() {
            handle.stop(timeout).await?;
        }
        Ok(())
    }
}

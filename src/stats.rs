//! # Statistics Aggregation
//!
//! The push path's materialized view: task counts maintained incrementally
//! from the event stream, plus a bounded history of recent events for
//! debugging.
//!
//! One `RwLock` owns both the snapshot and the history, so a reader either
//! sees the state before an event was applied or after, never a half-applied
//! mutation. Handlers are pure state transitions; nothing here touches the
//! network or suspends.
//!
//! Counts are approximations by design. Consumption starts at "new messages
//! only", duplicates on the stream double-count, and update events carry no
//! prior state to diff against. The pull path exists for exact reads.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::constants::system::{DEFAULT_HISTORY_LIMIT, MAX_EVENT_HISTORY};
use crate::events::{TaskEvent, TaskEventKind};
use crate::models::PriorityBreakdown;

/// Materialized task statistics
///
/// Invariant: `total == completed + pending` after every applied event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub by_priority: PriorityBreakdown,
    /// Stamped after every dispatched event, whatever its kind
    pub last_update: DateTime<Utc>,
}

impl TaskStats {
    fn zeroed() -> Self {
        Self {
            total: 0,
            completed: 0,
            pending: 0,
            by_priority: PriorityBreakdown::default(),
            last_update: Utc::now(),
        }
    }
}

impl Default for TaskStats {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Snapshot plus history, owned exclusively by the aggregator's lock
#[derive(Debug)]
struct StatsState {
    snapshot: TaskStats,
    history: VecDeque<TaskEvent>,
}

/// Applies stream events to the materialized statistics view
///
/// Shared between the ingestion loop (writer) and the read surface
/// (readers); cheap to clone behind an `Arc` at the composition layer.
#[derive(Debug)]
pub struct StatsAggregator {
    state: RwLock<StatsState>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StatsState {
                snapshot: TaskStats::zeroed(),
                history: VecDeque::with_capacity(MAX_EVENT_HISTORY),
            }),
        }
    }

    /// Apply one decoded event: record it in history, dispatch on its kind,
    /// and stamp `last_update`.
    ///
    /// The whole sequence runs under a single write lock.
    pub fn apply(&self, event: TaskEvent) {
        let kind = event.kind();
        let mut state = self.state.write();

        // Newest first; evict the oldest once over capacity
        state.history.push_front(event.clone());
        if state.history.len() > MAX_EVENT_HISTORY {
            state.history.pop_back();
        }

        match kind {
            TaskEventKind::Created => Self::on_created(&mut state.snapshot, &event),
            TaskEventKind::Updated => Self::on_updated(&event),
            TaskEventKind::Deleted => Self::on_deleted(&mut state.snapshot, &event),
            TaskEventKind::Generic => {
                debug!(event_type = %event.event_type, "Generic task event recorded");
            }
        }

        // Unconditional, even for kinds that changed no counts
        state.snapshot.last_update = Utc::now();
    }

    /// Defensive copy of the current snapshot.
    pub fn stats(&self) -> TaskStats {
        self.state.read().snapshot.clone()
    }

    /// Up to `limit` most recent events, newest first.
    pub fn event_history(&self, limit: usize) -> Vec<TaskEvent> {
        self.state.read().history.iter().take(limit).cloned().collect()
    }

    /// Most recent events with the standard read-surface limit.
    pub fn recent_events(&self) -> Vec<TaskEvent> {
        self.event_history(DEFAULT_HISTORY_LIMIT)
    }

    /// Number of events currently retained in history.
    pub fn history_len(&self) -> usize {
        self.state.read().history.len()
    }

    /// Zero the snapshot and clear history.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.snapshot = TaskStats::zeroed();
        state.history.clear();
        info!("Statistics reset");
    }

    fn on_created(snapshot: &mut TaskStats, event: &TaskEvent) {
        let Some(task) = event.task.as_ref() else {
            warn!(event_type = %event.event_type, "Created event without task payload, counts unchanged");
            return;
        };

        snapshot.total += 1;
        if task.completed {
            snapshot.completed += 1;
        } else {
            snapshot.pending += 1;
        }

        match task.parsed_priority() {
            Some(priority) => *snapshot.by_priority.bucket_mut(priority) += 1,
            None => {
                warn!(priority = %task.priority, "Unrecognized task priority, not counted in breakdown");
            }
        }

        info!(
            task_id = %task.id,
            total = snapshot.total,
            priority = %task.priority,
            "✨ Task created"
        );
    }

    fn on_updated(event: &TaskEvent) {
        let Some(task) = event.task.as_ref() else {
            return;
        };

        // Counts stay untouched: without the task's prior state there is no
        // correct delta to apply. History and last_update record the change.
        debug!(task_id = %task.id, "🔄 Task updated");
    }

    fn on_deleted(snapshot: &mut TaskStats, event: &TaskEvent) {
        let Some(task) = event.task.as_ref() else {
            warn!(event_type = %event.event_type, "Deleted event without task payload, counts unchanged");
            return;
        };

        // A stream joined mid-life sees deletions of tasks it never
        // counted. The status bucket and total move together or not at
        // all, so `total == completed + pending` survives such ghosts.
        let bucket = if task.completed {
            &mut snapshot.completed
        } else {
            &mut snapshot.pending
        };
        if *bucket > 0 {
            *bucket -= 1;
            snapshot.total = snapshot.total.saturating_sub(1);
        } else {
            warn!(task_id = %task.id, "Deletion for a task this view never counted");
        }

        if let Some(priority) = task.parsed_priority() {
            let priority_bucket = snapshot.by_priority.bucket_mut(priority);
            *priority_bucket = priority_bucket.saturating_sub(1);
        }

        info!(
            task_id = %task.id,
            total = snapshot.total,
            "🗑️ Task deleted"
        );
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskRecord;

    fn task(id: &str, completed: bool, priority: &str) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: Some(format!("task {id}")),
            description: None,
            completed,
            priority: priority.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    fn created(id: &str, completed: bool, priority: &str) -> TaskEvent {
        TaskEvent {
            event_type: "TASK_CREATED".to_string(),
            task: Some(task(id, completed, priority)),
            task_id: None,
            data: None,
            timestamp: Some(Utc::now()),
            instance: "test".to_string(),
        }
    }

    fn deleted(id: &str, completed: bool, priority: &str) -> TaskEvent {
        TaskEvent {
            event_type: "TASK_DELETED".to_string(),
            task: Some(task(id, completed, priority)),
            task_id: Some(id.to_string()),
            data: None,
            timestamp: Some(Utc::now()),
            instance: "test".to_string(),
        }
    }

    fn updated(id: &str, completed: bool, priority: &str) -> TaskEvent {
        TaskEvent {
            event_type: "TASK_UPDATED".to_string(),
            task: Some(task(id, completed, priority)),
            task_id: Some(id.to_string()),
            data: None,
            timestamp: Some(Utc::now()),
            instance: "test".to_string(),
        }
    }

    #[test]
    fn test_created_events_grow_the_snapshot() {
        let aggregator = StatsAggregator::new();

        aggregator.apply(created("t-1", false, "high"));
        aggregator.apply(created("t-2", true, "low"));

        let stats = aggregator.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.by_priority.high, 1);
        assert_eq!(stats.by_priority.low, 1);
    }

    #[test]
    fn test_lifecycle_scenario_counts_match() {
        let aggregator = StatsAggregator::new();

        aggregator.apply(created("t-1", false, "high"));
        aggregator.apply(created("t-2", true, "low"));
        aggregator.apply(deleted("t-1", false, "high"));

        let stats = aggregator.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.by_priority.high, 0);
        assert_eq!(stats.by_priority.medium, 0);
        assert_eq!(stats.by_priority.low, 1);
    }

    #[test]
    fn test_updated_events_touch_nothing_but_last_update() {
        let aggregator = StatsAggregator::new();
        aggregator.apply(created("t-1", false, "medium"));

        let before = aggregator.stats();
        aggregator.apply(updated("t-1", true, "high"));
        let after = aggregator.stats();

        // Counts are untouched; only the freshness stamp moved
        assert_eq!(after.total, before.total);
        assert_eq!(after.completed, before.completed);
        assert_eq!(after.pending, before.pending);
        assert_eq!(after.by_priority, before.by_priority);
        assert!(after.last_update >= before.last_update);
        assert_eq!(aggregator.history_len(), 2);
    }

    #[test]
    fn test_deletes_floor_at_zero() {
        let aggregator = StatsAggregator::new();

        // Deletions of tasks counted before this consumer joined the stream
        aggregator.apply(deleted("ghost-1", false, "high"));
        aggregator.apply(deleted("ghost-2", true, "low"));

        let stats = aggregator.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.by_priority, PriorityBreakdown::default());
    }

    #[test]
    fn test_unmatched_delete_keeps_snapshot_consistent() {
        let aggregator = StatsAggregator::new();
        aggregator.apply(created("t-1", true, "high"));

        // Deleting a pending task the view never counted must not break
        // total == completed + pending
        aggregator.apply(deleted("ghost", false, "medium"));

        let stats = aggregator.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total, stats.completed + stats.pending);
    }

    #[test]
    fn test_unknown_priority_counts_totals_only() {
        let aggregator = StatsAggregator::new();

        aggregator.apply(created("t-1", false, "urgent"));

        let stats = aggregator.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.by_priority.total(), 0);
    }

    #[test]
    fn test_created_without_task_changes_no_counts() {
        let aggregator = StatsAggregator::new();

        aggregator.apply(TaskEvent {
            event_type: "TASK_CREATED".to_string(),
            task: None,
            task_id: Some("t-1".to_string()),
            data: None,
            timestamp: None,
            instance: "test".to_string(),
        });

        let stats = aggregator.stats();
        assert_eq!(stats.total, 0);
        // The malformed-ish event still lands in history
        assert_eq!(aggregator.history_len(), 1);
    }

    #[test]
    fn test_generic_events_only_stamp_and_record() {
        let aggregator = StatsAggregator::new();
        let before = aggregator.stats();

        aggregator.apply(TaskEvent {
            event_type: "TASK_ARCHIVED".to_string(),
            task: None,
            task_id: None,
            data: Some(serde_json::json!({"reason": "stale"})),
            timestamp: None,
            instance: "test".to_string(),
        });

        let stats = aggregator.stats();
        assert_eq!(stats.total, 0);
        assert!(stats.last_update >= before.last_update);
        assert_eq!(aggregator.history_len(), 1);
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let aggregator = StatsAggregator::new();

        for i in 0..150 {
            aggregator.apply(created(&format!("t-{i}"), false, "medium"));
        }

        let history = aggregator.event_history(1000);
        assert_eq!(history.len(), MAX_EVENT_HISTORY);

        // Newest first: t-149 leads, the first 50 were evicted
        let first = history.first().unwrap();
        assert_eq!(first.task.as_ref().unwrap().id, "t-149");
        let last = history.last().unwrap();
        assert_eq!(last.task.as_ref().unwrap().id, "t-50");
    }

    #[test]
    fn test_history_limit_and_default() {
        let aggregator = StatsAggregator::new();
        for i in 0..40 {
            aggregator.apply(created(&format!("t-{i}"), false, "low"));
        }

        assert_eq!(aggregator.event_history(5).len(), 5);
        assert_eq!(aggregator.recent_events().len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(aggregator.event_history(1000).len(), 40);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let aggregator = StatsAggregator::new();
        aggregator.apply(created("t-1", true, "high"));

        let first = aggregator.stats();
        let second = aggregator.stats();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let aggregator = StatsAggregator::new();
        aggregator.apply(created("t-1", false, "high"));
        aggregator.apply(created("t-2", true, "low"));

        aggregator.reset();

        let stats = aggregator.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.pending, 0);
        assert_eq!(aggregator.history_len(), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Create { completed: bool, priority: usize },
            Delete { completed: bool, priority: usize },
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (any::<bool>(), 0usize..4).prop_map(|(completed, priority)| Op::Create {
                    completed,
                    priority
                }),
                (any::<bool>(), 0usize..4).prop_map(|(completed, priority)| Op::Delete {
                    completed,
                    priority
                }),
            ]
        }

        const PRIORITIES: &[&str] = &["low", "medium", "high", "unplanned"];

        proptest! {
            // Invariant: total stays the sum of completed and pending, and
            // nothing ever underflows, whatever order events arrive in.
            #[test]
            fn snapshot_invariant_holds_for_all_sequences(
                ops in prop::collection::vec(op_strategy(), 1..200)
            ) {
                let aggregator = StatsAggregator::new();

                for (i, op) in ops.iter().enumerate() {
                    let id = format!("t-{i}");
                    match op {
                        Op::Create { completed, priority } => {
                            aggregator.apply(created(&id, *completed, PRIORITIES[*priority]));
                        }
                        Op::Delete { completed, priority } => {
                            aggregator.apply(deleted(&id, *completed, PRIORITIES[*priority]));
                        }
                    }

                    let stats = aggregator.stats();
                    prop_assert_eq!(stats.total, stats.completed + stats.pending);
                }
            }
        }
    }
}

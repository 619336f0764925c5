//! # Task Wire Models
//!
//! Task records as served by the remote task store, plus the priority
//! vocabulary shared by the pull and push paths.
//!
//! The store speaks camelCase JSON and some deployments still emit the
//! document id as `_id`, so the serde layer accepts both spellings. Fields
//! the aggregation paths never touch stay optional and defaulted rather
//! than strict: a half-populated record must still count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task record as the remote store serves it.
///
/// Only `completed` and `priority` drive statistics; everything else is
/// carried for the grouped views and event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_priority() -> String {
    TaskPriority::Medium.as_str().to_string()
}

impl TaskRecord {
    /// Parsed priority, or `None` for values outside the known vocabulary.
    pub fn parsed_priority(&self) -> Option<TaskPriority> {
        TaskPriority::parse(&self.priority)
    }
}

/// The priority vocabulary the task store enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    /// Parse a wire priority string, case-insensitively.
    ///
    /// Returns `None` for anything outside the known vocabulary; callers
    /// decide whether that is worth a warning.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

/// Per-priority task counts inside a statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl PriorityBreakdown {
    /// Count of tasks across every bucket.
    pub fn total(&self) -> u64 {
        self.high + self.medium + self.low
    }

    pub(crate) fn bucket_mut(&mut self, priority: TaskPriority) -> &mut u64 {
        match priority {
            TaskPriority::High => &mut self.high,
            TaskPriority::Medium => &mut self.medium,
            TaskPriority::Low => &mut self.low,
        }
    }
}

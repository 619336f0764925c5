//! # Domain Events
//!
//! The wire envelope for task lifecycle events and the tag vocabulary the
//! aggregation engine dispatches on.
//!
//! Producers publish `{eventType, task | taskId | data, timestamp, instance}`
//! JSON objects. Dispatch keys off the `eventType` tag rather than the topic
//! a message arrived on, so a lifecycle event routed through the generic
//! channel still counts. Tags outside the known vocabulary decode fine and
//! land in history as [`TaskEventKind::Generic`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::event_tags;
use crate::models::TaskRecord;

/// A decoded task lifecycle event.
///
/// Exactly which optional fields are populated depends on the tag: lifecycle
/// events carry the full `task` (some producers send deletions with only a
/// `taskId`), generic activity events carry free-form `data`. Nothing here
/// is mutated after decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// Producer-assigned tag, e.g. `TASK_CREATED`
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Name of the producing service instance
    #[serde(default = "default_instance")]
    pub instance: String,
}

fn default_instance() -> String {
    "unknown".to_string()
}

impl TaskEvent {
    /// Decode a raw stream payload.
    pub fn decode(payload: &[u8]) -> Result<Self, MalformedEventError> {
        let event = serde_json::from_slice(payload)?;
        Ok(event)
    }

    /// The dispatch kind derived from the event tag.
    pub fn kind(&self) -> TaskEventKind {
        TaskEventKind::from_tag(&self.event_type)
    }
}

/// Dispatch classification of an event tag.
///
/// The three lifecycle kinds mutate the statistics snapshot; everything
/// else is `Generic` and is retained in history only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Created,
    Updated,
    Deleted,
    Generic,
}

impl TaskEventKind {
    /// Map a producer tag onto a dispatch kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            event_tags::TASK_CREATED => TaskEventKind::Created,
            event_tags::TASK_UPDATED => TaskEventKind::Updated,
            event_tags::TASK_DELETED => TaskEventKind::Deleted,
            _ => TaskEventKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEventKind::Created => "created",
            TaskEventKind::Updated => "updated",
            TaskEventKind::Deleted => "deleted",
            TaskEventKind::Generic => "generic",
        }
    }
}

/// Raised when a stream payload is not a valid event envelope.
///
/// Ingestion logs these and drops the message; they are never fatal.
#[derive(Debug, thiserror::Error)]
#[error("Malformed event payload: {source}")]
pub struct MalformedEventError {
    #[from]
    source: serde_json::Error,
}

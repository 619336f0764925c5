//! # System Constants
//!
//! Core constants that define the operational boundaries of the analytics
//! core: stream topic names, domain event tags, and system-wide defaults.
//!
//! Topic names and event tags mirror what the task store publishes; they are
//! part of the wire contract and must not drift.

/// Stream topics the analytics consumer subscribes to
pub mod topics {
    /// A task was created
    pub const TASK_CREATED: &str = "task-created";

    /// A task was updated in place
    pub const TASK_UPDATED: &str = "task-updated";

    /// A task was deleted
    pub const TASK_DELETED: &str = "task-deleted";

    /// Catch-all channel for generic task activity
    pub const TASK_EVENTS: &str = "task-events";

    /// Every topic this crate consumes, in subscription order
    pub const ALL: &[&str] = &[TASK_CREATED, TASK_UPDATED, TASK_DELETED, TASK_EVENTS];
}

/// Event type tags carried in the `eventType` field of each message
pub mod event_tags {
    pub const TASK_CREATED: &str = "TASK_CREATED";
    pub const TASK_UPDATED: &str = "TASK_UPDATED";
    pub const TASK_DELETED: &str = "TASK_DELETED";
}

/// System-wide constants
pub mod system {
    /// Version compatibility marker
    pub const ANALYTICS_CORE_VERSION: &str = "0.1.0";

    /// Service name reported in health and provenance payloads
    pub const SERVICE_NAME: &str = "analytics-service";

    /// Maximum number of events retained in the rolling history buffer
    pub const MAX_EVENT_HISTORY: usize = 100;

    /// Default number of history entries returned when no limit is given
    pub const DEFAULT_HISTORY_LIMIT: usize = 20;
}

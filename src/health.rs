//! # Health Reporting
//!
//! Liveness payload for whatever surface embeds the analytics core. The
//! shape is deliberately small; the richer operational picture lives in the
//! breaker status and combined statistics payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::system::{ANALYTICS_CORE_VERSION, SERVICE_NAME};

/// Liveness answer: the service is up and knows who it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn current() -> Self {
        Self {
            status: "OK".to_string(),
            service: SERVICE_NAME.to_string(),
            version: ANALYTICS_CORE_VERSION.to_string(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for HealthReport {
    fn default() -> Self {
        Self::current()
    }
}

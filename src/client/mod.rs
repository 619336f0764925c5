//! # Task Store Client
//!
//! The pull path: resilient HTTP access to the remote task store's
//! `GET /api/tasks` endpoint.
//!
//! [`TaskStoreClient`] is the public entry point; it layers the circuit
//! breaker over the retry executor over a [`TaskFetcher`] transport seam,
//! and exposes the breaker for status reporting and manual reset.

pub mod task_store;

// Re-export main types for easy access
pub use task_store::{
    FetchError, HttpTaskFetcher, TaskFetcher, TaskStoreClient, TaskStoreConfig, TransportError,
};

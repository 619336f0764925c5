//! # Messaging Module
//!
//! Event stream plumbing for the push path: the transport seam
//! ([`EventSource`] / [`EventSubscription`]), an in-process broadcast bus as
//! the reference transport, and the ingestion loop that feeds the
//! statistics aggregator.

pub mod bus;
pub mod ingestor;
pub mod source;

pub use bus::InProcessEventBus;
pub use ingestor::{EventIngestor, IngestorHandle};
pub use source::{EventSource, EventSubscription, StreamError, StreamMessage};

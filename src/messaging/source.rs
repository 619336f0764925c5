//! # Event Stream Abstractions
//!
//! The transport seam between the broker and the ingestion loop. Real
//! broker bindings live outside this crate; anything that can yield ordered
//! per-topic messages can feed the aggregator by implementing
//! [`EventSource`].

use async_trait::async_trait;

/// A raw message as delivered by the stream transport
#[derive(Debug, Clone)]
pub struct StreamMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Undecoded payload bytes
    pub payload: Vec<u8>,
}

impl StreamMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Errors raised while establishing or operating a stream subscription
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Could not reach the broker at all
    #[error("Failed to connect to event stream at {broker}: {reason}")]
    ConnectionFailed { broker: String, reason: String },

    /// Connected, but the subscription could not be established
    #[error("Failed to subscribe to topics {topics}: {reason}")]
    SubscriptionFailed { topics: String, reason: String },

    /// A payload could not be serialized for publishing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StreamError {
    pub fn connection_failed(broker: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::ConnectionFailed {
            broker: broker.into(),
            reason: reason.into(),
        }
    }

    pub fn subscription_failed(topics: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::SubscriptionFailed {
            topics: topics.into(),
            reason: reason.into(),
        }
    }
}

/// Something that can hand out per-topic subscriptions
///
/// Subscriptions deliver new messages only; there is no backlog replay.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a subscription covering `topics`.
    async fn subscribe(&self, topics: &[&str]) -> Result<Box<dyn EventSubscription>, StreamError>;
}

/// An open subscription yielding messages in per-topic order
#[async_trait]
pub trait EventSubscription: Send {
    /// Wait for the next message; `None` means the stream has closed and
    /// no further messages will arrive.
    async fn next_message(&mut self) -> Option<StreamMessage>;
}

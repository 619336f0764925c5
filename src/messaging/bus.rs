//! # In-Process Event Bus
//!
//! Broadcast-backed reference implementation of [`EventSource`], used for
//! single-process deployments and as the test transport. Broker-specific
//! bindings (Kafka and friends) implement the same traits out of tree.
//!
//! Broadcast receivers only observe messages sent after they subscribe,
//! which is exactly the "new messages only" consumption contract.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::source::{EventSource, EventSubscription, StreamError, StreamMessage};
use crate::events::TaskEvent;

/// Fan-out bus for task events within one process
#[derive(Debug, Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<StreamMessage>,
}

impl InProcessEventBus {
    /// Create a new bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish raw payload bytes to a topic.
    ///
    /// Sending without subscribers is not an error; the message is simply
    /// dropped, matching broker semantics for unobserved topics.
    pub fn publish(&self, topic: impl Into<String>, payload: Vec<u8>) {
        let message = StreamMessage::new(topic, payload);
        if let Err(broadcast::error::SendError(dropped)) = self.sender.send(message) {
            debug!(topic = %dropped.topic, "No subscribers for published message");
        }
    }

    /// Serialize and publish a task event.
    pub fn publish_event(&self, topic: &str, event: &TaskEvent) -> Result<(), StreamError> {
        let payload = serde_json::to_vec(event)?;
        self.publish(topic, payload);
        Ok(())
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventSource for InProcessEventBus {
    async fn subscribe(&self, topics: &[&str]) -> Result<Box<dyn EventSubscription>, StreamError> {
        let receiver = self.sender.subscribe();
        let topics: HashSet<String> = topics.iter().map(|t| t.to_string()).collect();
        Ok(Box::new(BusSubscription { receiver, topics }))
    }
}

/// A live subscription against the in-process bus
struct BusSubscription {
    receiver: broadcast::Receiver<StreamMessage>,
    topics: HashSet<String>,
}

#[async_trait]
impl EventSubscription for BusSubscription {
    async fn next_message(&mut self) -> Option<StreamMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.topics.contains(&message.topic) => return Some(message),
                // Not one of ours; keep waiting
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscription lagged, messages were dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

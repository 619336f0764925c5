//! # Event Ingestor
//!
//! The consumption loop of the push path: takes messages off an
//! [`EventSource`] subscription, decodes them, and feeds the aggregator.
//!
//! One bad message never blocks the stream. Malformed payloads are logged
//! and dropped; decoding and applying are infallible from the loop's point
//! of view. The loop exits on stream close or shutdown notification, and
//! flips its running flag on the way out so the owner can observe the
//! degradation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::source::{EventSource, EventSubscription, StreamError, StreamMessage};
use crate::constants::topics;
use crate::error::AnalyticsError;
use crate::events::TaskEvent;
use crate::stats::StatsAggregator;

/// Consumes the task event stream and applies it to a [`StatsAggregator`]
#[derive(Debug)]
pub struct EventIngestor {
    aggregator: Arc<StatsAggregator>,
}

impl EventIngestor {
    pub fn new(aggregator: Arc<StatsAggregator>) -> Self {
        Self { aggregator }
    }

    /// Subscribe to the task topics and spawn the consumption loop.
    ///
    /// Fails only if the subscription cannot be established; from then on
    /// the loop runs until stream close or [`IngestorHandle::stop`].
    pub async fn start(self, source: &dyn EventSource) -> Result<IngestorHandle, StreamError> {
        let subscription = source.subscribe(topics::ALL).await?;
        info!(topics = ?topics::ALL, "📥 Subscribed to task event topics");

        let running = Arc::new(AtomicBool::new(true));
        let shutdown_notify = Arc::new(Notify::new());

        let join_handle = tokio::spawn(consume_loop(
            subscription,
            self.aggregator,
            running.clone(),
            shutdown_notify.clone(),
        ));
        info!("🎧 Event ingestor is now listening for messages");

        Ok(IngestorHandle {
            running,
            shutdown_notify,
            join_handle,
        })
    }
}

/// Owner-side handle to a running ingestion loop
#[derive(Debug)]
pub struct IngestorHandle {
    running: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    join_handle: JoinHandle<()>,
}

impl IngestorHandle {
    /// Whether the consumption loop is still alive.
    ///
    /// Turns false when the stream closes underneath the loop, which is
    /// how the composition layer detects a degraded push path.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the loop and wait for it to finish, bounded by `timeout`.
    pub async fn stop(mut self, timeout: Duration) -> crate::error::Result<()> {
        // notify_one stores a permit, so a stop issued before the loop
        // reaches its next select still lands.
        self.shutdown_notify.notify_one();

        match tokio::time::timeout(timeout, &mut self.join_handle).await {
            Ok(_) => {
                info!("Event ingestor stopped");
                Ok(())
            }
            Err(_) => {
                warn!("Event ingestor did not stop in time, aborting");
                self.join_handle.abort();
                Err(AnalyticsError::StreamError(
                    "Event ingestor stop timed out".to_string(),
                ))
            }
        }
    }
}

async fn consume_loop(
    mut subscription: Box<dyn EventSubscription>,
    aggregator: Arc<StatsAggregator>,
    running: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
) {
    loop {
        tokio::select! {
            _ = shutdown_notify.notified() => {
                debug!("Shutdown notification received");
                break;
            }
            maybe_message = subscription.next_message() => {
                match maybe_message {
                    Some(message) => handle_message(&aggregator, &message),
                    None => {
                        warn!("Event stream closed, ingestion stopping");
                        break;
                    }
                }
            }
        }
    }

    running.store(false, Ordering::Release);
}

/// Decode and apply a single message; never raises.
fn handle_message(aggregator: &StatsAggregator, message: &StreamMessage) {
    if !topics::ALL.contains(&message.topic.as_str()) {
        warn!(topic = %message.topic, "Unknown topic");
        return;
    }

    match TaskEvent::decode(&message.payload) {
        Ok(event) => {
            info!(
                topic = %message.topic,
                event_type = %event.event_type,
                "📨 Received event"
            );
            aggregator.apply(event);
        }
        Err(e) => {
            error!(
                topic = %message.topic,
                error = %e,
                "Failed to process message, dropping it"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskRecord;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Yields a scripted sequence of messages, then reports stream close
    struct ScriptedSource {
        messages: parking_lot::Mutex<VecDeque<StreamMessage>>,
    }

    impl ScriptedSource {
        fn new(messages: Vec<StreamMessage>) -> Self {
            Self {
                messages: parking_lot::Mutex::new(messages.into()),
            }
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn subscribe(
            &self,
            _topics: &[&str],
        ) -> Result<Box<dyn EventSubscription>, StreamError> {
            let drained: VecDeque<StreamMessage> = self.messages.lock().drain(..).collect();
            Ok(Box::new(ScriptedSubscription { queue: drained }))
        }
    }

    struct ScriptedSubscription {
        queue: VecDeque<StreamMessage>,
    }

    #[async_trait]
    impl EventSubscription for ScriptedSubscription {
        async fn next_message(&mut self) -> Option<StreamMessage> {
            self.queue.pop_front()
        }
    }

    /// Subscription attempts always fail
    struct BrokenSource;

    #[async_trait]
    impl EventSource for BrokenSource {
        async fn subscribe(
            &self,
            _topics: &[&str],
        ) -> Result<Box<dyn EventSubscription>, StreamError> {
            Err(StreamError::connection_failed(
                "kafka:9092",
                "connection refused",
            ))
        }
    }

    fn created_payload(id: &str, completed: bool, priority: &str) -> Vec<u8> {
        let event = TaskEvent {
            event_type: "TASK_CREATED".to_string(),
            task: Some(TaskRecord {
                id: id.to_string(),
                title: None,
                description: None,
                completed,
                priority: priority.to_string(),
                created_at: None,
                updated_at: None,
            }),
            task_id: None,
            data: None,
            timestamp: None,
            instance: "test".to_string(),
        };
        serde_json::to_vec(&event).unwrap()
    }

    async fn run_to_completion(source: ScriptedSource) -> Arc<StatsAggregator> {
        let aggregator = Arc::new(StatsAggregator::new());
        let ingestor = EventIngestor::new(aggregator.clone());
        let handle = ingestor.start(&source).await.unwrap();

        // The scripted stream closes once drained; the loop exits on its own
        handle.stop(Duration::from_secs(1)).await.unwrap();
        aggregator
    }

    #[tokio::test]
    async fn test_ingests_events_into_the_aggregator() {
        let source = ScriptedSource::new(vec![
            StreamMessage::new(topics::TASK_CREATED, created_payload("t-1", false, "high")),
            StreamMessage::new(topics::TASK_CREATED, created_payload("t-2", true, "low")),
        ]);

        let aggregator = run_to_completion(source).await;
        let stats = aggregator.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_dropped_not_fatal() {
        let source = ScriptedSource::new(vec![
            StreamMessage::new(topics::TASK_CREATED, b"{not json".to_vec()),
            StreamMessage::new(topics::TASK_CREATED, created_payload("t-1", false, "medium")),
        ]);

        let aggregator = run_to_completion(source).await;

        // The poison message was skipped, the one after it still counted
        let stats = aggregator.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(aggregator.history_len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_topics_are_ignored() {
        let source = ScriptedSource::new(vec![
            StreamMessage::new("task-archived", created_payload("t-1", false, "high")),
            StreamMessage::new(topics::TASK_CREATED, created_payload("t-2", false, "low")),
        ]);

        let aggregator = run_to_completion(source).await;

        let stats = aggregator.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_priority.high, 0);
        assert_eq!(stats.by_priority.low, 1);
    }

    #[tokio::test]
    async fn test_lifecycle_events_count_by_tag_not_topic() {
        // A deletion routed through the generic channel still counts
        let delete = TaskEvent {
            event_type: "TASK_DELETED".to_string(),
            task: Some(TaskRecord {
                id: "t-1".to_string(),
                title: None,
                description: None,
                completed: false,
                priority: "high".to_string(),
                created_at: None,
                updated_at: None,
            }),
            task_id: Some("t-1".to_string()),
            data: None,
            timestamp: None,
            instance: "test".to_string(),
        };
        let source = ScriptedSource::new(vec![
            StreamMessage::new(topics::TASK_CREATED, created_payload("t-1", false, "high")),
            StreamMessage::new(topics::TASK_EVENTS, serde_json::to_vec(&delete).unwrap()),
        ]);

        let aggregator = run_to_completion(source).await;

        let stats = aggregator.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_priority.high, 0);
    }

    #[tokio::test]
    async fn test_subscription_failure_surfaces_as_stream_error() {
        let aggregator = Arc::new(StatsAggregator::new());
        let ingestor = EventIngestor::new(aggregator);

        let err = ingestor.start(&BrokenSource).await.unwrap_err();
        assert!(matches!(err, StreamError::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_loop_reports_not_running_after_stream_close() {
        let source = ScriptedSource::new(vec![]);
        let aggregator = Arc::new(StatsAggregator::new());
        let handle = EventIngestor::new(aggregator)
            .start(&source)
            .await
            .unwrap();

        // Empty scripted stream closes immediately
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_running());
        handle.stop(Duration::from_secs(1)).await.unwrap();
    }
}

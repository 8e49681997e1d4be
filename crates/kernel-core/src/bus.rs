//! Message Bus
//!
//! Publish/subscribe capability the dispatcher listens on, plus a
//! process-local implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{KernelError, Result};
use crate::task::Task;

/// Topic the dispatcher publishes task results on
pub const RESULTS_TOPIC: &str = "tasks.results";

/// Receives one inbound task per invocation
pub type TaskHandler = Arc<dyn Fn(Task) -> BoxFuture<'static, ()> + Send + Sync>;

/// Publish/subscribe transport
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a JSON message on a topic
    async fn publish(&self, topic: &str, message: Value) -> Result<()>;

    /// Deliver every task published on `topic` to `handler`
    async fn subscribe(&self, topic: &str, handler: TaskHandler) -> Result<()>;
}

/// Serialize and publish any message
pub async fn publish_json<T: Serialize + Sync>(
    bus: &dyn MessageBus,
    topic: &str,
    message: &T,
) -> Result<()> {
    bus.publish(topic, serde_json::to_value(message)?).await
}

/// A message seen on the in-memory bus
#[derive(Clone, Debug)]
pub struct Envelope {
    pub topic: String,
    pub message: Value,
}

/// Process-local bus.
///
/// Published messages are decoded as tasks for that topic's handlers, each
/// handler running on its own tokio task. Every envelope is also broadcast to
/// observers returned by [`InMemoryBus::watch`].
pub struct InMemoryBus {
    handlers: RwLock<HashMap<String, Vec<TaskHandler>>>,
    events: broadcast::Sender<Envelope>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// `capacity` bounds how far a slow observer may lag
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Observe every envelope published from now on
    pub fn watch(&self) -> broadcast::Receiver<Envelope> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, message: Value) -> Result<()> {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default();

        if !handlers.is_empty() {
            let task: Task = serde_json::from_value(message.clone())
                .map_err(|e| KernelError::Bus(format!("message on '{topic}' is not a task: {e}")))?;

            for handler in handlers {
                tokio::spawn(handler(task.clone()));
            }
        }

        // No observers is fine
        let _ = self.events.send(Envelope {
            topic: topic.to_string(),
            message,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: TaskHandler) -> Result<()> {
        if topic.trim().is_empty() {
            return Err(KernelError::Bus("cannot subscribe to an empty topic".into()));
        }

        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(handler);

        tracing::debug!(topic = %topic, "Subscribed to topic");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = InMemoryBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handler: TaskHandler = Arc::new(move |task: Task| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(task);
            }
            .boxed()
        });
        bus.subscribe("tasks.inbound", handler).await.unwrap();
        assert_eq!(bus.subscriber_count("tasks.inbound"), 1);

        bus.publish("tasks.inbound", json!({"id": "1", "tool": "echo"}))
            .await
            .unwrap();

        let task = rx.recv().await.unwrap();
        assert_eq!(task.id, "1");
        assert_eq!(task.tool, "echo");
    }

    #[tokio::test]
    async fn test_watch_sees_every_topic() {
        let bus = InMemoryBus::new();
        let mut watcher = bus.watch();

        bus.publish(RESULTS_TOPIC, json!({"task_id": "1"})).await.unwrap();

        let envelope = watcher.recv().await.unwrap();
        assert_eq!(envelope.topic, RESULTS_TOPIC);
        assert_eq!(envelope.message["task_id"], "1");
    }

    #[tokio::test]
    async fn test_non_task_message_to_subscribed_topic() {
        let bus = InMemoryBus::new();
        let handler: TaskHandler = Arc::new(|_task: Task| async {}.boxed());
        bus.subscribe("tasks.inbound", handler).await.unwrap();

        let err = bus.publish("tasks.inbound", json!(["not", "a", "task"])).await.unwrap_err();
        assert!(matches!(err, KernelError::Bus(_)));
    }

    #[tokio::test]
    async fn test_empty_topic_rejected() {
        let bus = InMemoryBus::new();
        let handler: TaskHandler = Arc::new(|_task: Task| async {}.boxed());
        assert!(bus.subscribe(" ", handler).await.is_err());
    }
}

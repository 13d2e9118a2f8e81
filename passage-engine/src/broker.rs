//! Message broker contract and in-process implementation.
//!
//! Queues are named, single-consumer, and consumed one message at a time
//! (prefetch = 1 semantics), which preserves per-resource ordering.
//! Exchanges fan one publish out to every bound queue. Consumers never
//! re-queue a failing message: they publish it to the `<queue>_FAILED`
//! dead-letter sibling and move on.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::debug;

use passage_core::{PassageError, Result};

/// Delivery contract the pipeline programs against.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish to a queue, or to every queue bound to an exchange of that
    /// name.
    async fn publish(&self, target: &str, payload: Value) -> Result<()>;

    /// Take the consumer side of a queue. One consumer per queue.
    async fn subscribe(&self, queue: &str) -> Result<UnboundedReceiver<Value>>;
}

struct QueueState {
    tx: UnboundedSender<Value>,
    rx: Option<UnboundedReceiver<Value>>,
}

impl QueueState {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

/// In-process [`Broker`] over unbounded mpsc channels.
#[derive(Default)]
pub struct InProcessBroker {
    queues: Mutex<HashMap<String, QueueState>>,
    bindings: Mutex<HashMap<String, Vec<String>>>,
}

impl InProcessBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a queue to an exchange; publishes to the exchange reach every
    /// bound queue.
    pub async fn bind(&self, exchange: &str, queue: &str) {
        self.bindings
            .lock()
            .await
            .entry(exchange.to_string())
            .or_default()
            .push(queue.to_string());
        debug!(exchange, queue, "bound queue");
    }

    async fn deliver(&self, queue: &str, payload: Value) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .entry(queue.to_string())
            .or_insert_with(QueueState::new);
        state.tx.send(payload).map_err(|_| {
            PassageError::Broker(format!("queue '{queue}' receiver dropped"))
        })
    }
}

#[async_trait]
impl Broker for InProcessBroker {
    async fn publish(&self, target: &str, payload: Value) -> Result<()> {
        let bound = self.bindings.lock().await.get(target).cloned();
        match bound {
            Some(queues) => {
                for queue in queues {
                    self.deliver(&queue, payload.clone()).await?;
                }
                Ok(())
            }
            None => self.deliver(target, payload).await,
        }
    }

    async fn subscribe(&self, queue: &str) -> Result<UnboundedReceiver<Value>> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .entry(queue.to_string())
            .or_insert_with(QueueState::new);
        state
            .rx
            .take()
            .ok_or_else(|| PassageError::Broker(format!("queue '{queue}' already has a consumer")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn publish_before_subscribe_buffers() {
        let broker = InProcessBroker::new();
        broker.publish("q", json!({"n": 1})).await.unwrap();
        broker.publish("q", json!({"n": 2})).await.unwrap();
        let mut rx = broker.subscribe("q").await.unwrap();
        assert_eq!(rx.recv().await.unwrap()["n"], 1);
        assert_eq!(rx.recv().await.unwrap()["n"], 2);
    }

    #[tokio::test]
    async fn exchange_fans_out_to_bound_queues() {
        let broker = InProcessBroker::new();
        broker.bind("exchange", "a").await;
        broker.bind("exchange", "b").await;
        broker.publish("exchange", json!("msg")).await.unwrap();
        let mut a = broker.subscribe("a").await.unwrap();
        let mut b = broker.subscribe("b").await.unwrap();
        assert_eq!(a.recv().await.unwrap(), json!("msg"));
        assert_eq!(b.recv().await.unwrap(), json!("msg"));
    }

    #[tokio::test]
    async fn second_consumer_is_rejected() {
        let broker = InProcessBroker::new();
        let _rx = broker.subscribe("q").await.unwrap();
        assert!(broker.subscribe("q").await.is_err());
    }
}

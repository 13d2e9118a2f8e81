//! Queue consumers.
//!
//! Every consumer processes one message at a time (prefetch = 1) and never
//! re-queues a failure: the message and its error go to the queue's
//! `_FAILED` dead-letter sibling and the consumer moves on, so a poison
//! message can never stall a queue.

pub mod analytics;
pub mod feedback;
pub mod ingest;
pub mod persist;

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use passage_core::failed_queue;

use crate::broker::Broker;

/// Sequential consumer loop with dead-letter handling. Runs until the
/// queue's sender side is dropped.
pub(crate) async fn run_consumer<F, Fut>(broker: Arc<dyn Broker>, queue: &str, handler: F)
where
    F: Fn(Value) -> Fut,
    Fut: Future<Output = passage_core::Result<()>>,
{
    let mut rx = match broker.subscribe(queue).await {
        Ok(rx) => rx,
        Err(e) => {
            error!(queue, error = %e, "consumer could not subscribe");
            return;
        }
    };
    info!(queue, "consumer started");
    while let Some(message) = rx.recv().await {
        if let Err(e) = handler(message.clone()).await {
            error!(queue, error = %e, "message failed, dead-lettering");
            let dead = json!({
                "error": e.to_string(),
                "message": message,
            });
            if let Err(publish_err) = broker.publish(&failed_queue(queue), dead).await {
                error!(queue, error = %publish_err, "dead-letter publish failed");
            }
        }
    }
    info!(queue, "consumer stopped");
}

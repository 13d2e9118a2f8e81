//! The feedback consumer: one vote at a time, which also serializes
//! adapter training per collection.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use passage_core::{FeedbackEvent, Result, FEEDBACK_QUEUE};

use crate::broker::Broker;
use crate::feedback::FeedbackService;
use crate::workers::run_consumer;

pub struct FeedbackWorker {
    service: Arc<FeedbackService>,
    broker: Arc<dyn Broker>,
}

impl FeedbackWorker {
    pub fn new(service: Arc<FeedbackService>, broker: Arc<dyn Broker>) -> Self {
        Self { service, broker }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let broker = self.broker.clone();
        tokio::spawn(async move {
            run_consumer(broker, FEEDBACK_QUEUE, |message| {
                let worker = self.clone();
                async move { worker.handle(message).await }
            })
            .await;
        })
    }

    async fn handle(&self, message: Value) -> Result<()> {
        let event: FeedbackEvent = serde_json::from_value(message)?;
        self.service.process_event(event).await
    }
}

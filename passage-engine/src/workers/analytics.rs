//! The analytics consumer: search telemetry into the document store.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use passage_core::{AnalyticsEvent, Result, ANALYTICS_QUEUE};

use crate::broker::Broker;
use crate::docstore::{ns, put_typed, DocStore};
use crate::workers::run_consumer;

pub struct AnalyticsWorker {
    docstore: Arc<dyn DocStore>,
    broker: Arc<dyn Broker>,
}

impl AnalyticsWorker {
    pub fn new(docstore: Arc<dyn DocStore>, broker: Arc<dyn Broker>) -> Self {
        Self { docstore, broker }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let broker = self.broker.clone();
        tokio::spawn(async move {
            run_consumer(broker, ANALYTICS_QUEUE, |message| {
                let worker = self.clone();
                async move { worker.handle(message).await }
            })
            .await;
        })
    }

    async fn handle(&self, message: Value) -> Result<()> {
        let event: AnalyticsEvent = serde_json::from_value(message)?;
        put_typed(self.docstore.as_ref(), ns::ANALYTICS, &event.id, &event).await
    }
}

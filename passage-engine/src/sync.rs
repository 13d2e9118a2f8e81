//! Periodic re-load of URL-backed resources.
//!
//! Re-publishes `load` events for every live resource with a source URL;
//! the ingestion worker's content-hash check makes unchanged sources a
//! no-op, so the job is safe to run on a tight schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use passage_core::{IngestAction, IngestData, IngestEvent, Resource, Result, INGEST_QUEUE};

use crate::broker::Broker;
use crate::docstore::{list_typed, ns, DocStore};

pub struct RagSyncJob {
    docstore: Arc<dyn DocStore>,
    broker: Arc<dyn Broker>,
}

impl RagSyncJob {
    pub fn new(docstore: Arc<dyn DocStore>, broker: Arc<dyn Broker>) -> Self {
        Self { docstore, broker }
    }

    /// One sweep: enqueue a `load` for every live URL resource.
    pub async fn run_once(&self) -> Result<usize> {
        let resources: Vec<Resource> = list_typed(self.docstore.as_ref(), ns::RESOURCES).await?;
        let mut published = 0usize;
        for resource in resources
            .iter()
            .filter(|r| !r.is_deleted && r.url.is_some())
        {
            let event = IngestEvent::new(
                IngestAction::Load,
                IngestData {
                    resource_id: resource.id.clone(),
                    collection_id: resource.collection_id.clone(),
                    url: resource.url.clone(),
                },
            );
            self.broker
                .publish(INGEST_QUEUE, serde_json::to_value(&event)?)
                .await?;
            published += 1;
        }
        info!(published, "rag sync sweep complete");
        Ok(published)
    }

    /// Run sweeps forever on a fixed interval.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    warn!(error = %e, "rag sync sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::broker::InProcessBroker;
    use crate::docstore::{put_typed, MemoryDocStore};

    use super::*;

    #[tokio::test]
    async fn sweep_targets_only_live_url_resources() {
        let docstore = Arc::new(MemoryDocStore::new());
        let broker = Arc::new(InProcessBroker::new());

        let base = Resource {
            id: String::new(),
            collection_id: "c1".into(),
            owner_id: "public".into(),
            title: None,
            url: None,
            content: None,
            description: None,
            metadata: Default::default(),
            chunk_overrides: None,
            refreshed_at: chrono::Utc::now(),
            is_deleted: false,
        };
        let mut with_url = base.clone();
        with_url.id = "r-url".into();
        with_url.url = Some("https://example.com/doc".into());
        let mut inline = base.clone();
        inline.id = "r-inline".into();
        inline.content = Some("text".into());
        let mut deleted = base.clone();
        deleted.id = "r-deleted".into();
        deleted.url = Some("https://example.com/gone".into());
        deleted.is_deleted = true;

        for resource in [&with_url, &inline, &deleted] {
            put_typed(docstore.as_ref(), ns::RESOURCES, &resource.id, resource)
                .await
                .unwrap();
        }

        let job = RagSyncJob::new(docstore, broker.clone());
        let published = job.run_once().await.unwrap();
        assert_eq!(published, 1);

        let mut rx = broker.subscribe(INGEST_QUEUE).await.unwrap();
        let event: IngestEvent = serde_json::from_value(rx.recv().await.unwrap()).unwrap();
        assert_eq!(event.data.resource_id, "r-url");
        assert_eq!(event.event, IngestAction::Load);
    }
}

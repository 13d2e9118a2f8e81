//! The ingestion consumer: drives load → chunk → delete for one resource
//! at a time.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use passage_core::{
    content_hash, IngestAction, IngestData, IngestEvent, PassageError, RealtimeMessage, Resource,
    ResourceStatus, Result, INGEST_QUEUE,
};
use passage_embed::Embedder;

use crate::broker::Broker;
use crate::collections::CollectionService;
use crate::docstore::{get_typed, ns, put_typed, DocStore};
use crate::loader::DocumentLoader;
use crate::processor::DocumentProcessor;
use crate::workers::run_consumer;

pub struct IngestWorker {
    docstore: Arc<dyn DocStore>,
    collections: Arc<CollectionService>,
    embedder: Arc<dyn Embedder>,
    broker: Arc<dyn Broker>,
    loader: Arc<DocumentLoader>,
    realtime: broadcast::Sender<RealtimeMessage>,
}

impl IngestWorker {
    pub fn new(
        docstore: Arc<dyn DocStore>,
        collections: Arc<CollectionService>,
        embedder: Arc<dyn Embedder>,
        broker: Arc<dyn Broker>,
        loader: Arc<DocumentLoader>,
        realtime: broadcast::Sender<RealtimeMessage>,
    ) -> Self {
        Self {
            docstore,
            collections,
            embedder,
            broker,
            loader,
            realtime,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let broker = self.broker.clone();
        tokio::spawn(async move {
            run_consumer(broker, INGEST_QUEUE, |message| {
                let worker = self.clone();
                async move { worker.handle(message).await }
            })
            .await;
        })
    }

    async fn handle(&self, message: Value) -> Result<()> {
        let event: IngestEvent = serde_json::from_value(message)?;
        let result = self.process(&event).await;
        if let Err(e) = &result {
            // Best effort: record the failure on the resource before the
            // message is dead-lettered.
            self.mark_error(&event.data, e.to_string()).await;
        }
        result
    }

    async fn mark_error(&self, data: &IngestData, message: String) {
        if let Ok(Some(mut resource)) =
            get_typed::<Resource>(self.docstore.as_ref(), ns::RESOURCES, &data.resource_id).await
        {
            resource.set_status(ResourceStatus::Error, Some(message));
            let _ = put_typed(
                self.docstore.as_ref(),
                ns::RESOURCES,
                &resource.id,
                &resource,
            )
            .await;
            self.notify(&resource);
        }
    }

    /// Publish the resource's current status on the realtime channel.
    fn notify(&self, resource: &Resource) {
        if let Some(status) = resource.status() {
            let _ = self.realtime.send(RealtimeMessage {
                resource_id: resource.id.clone(),
                collection_id: resource.collection_id.clone(),
                status,
            });
        }
    }

    async fn save_with_status(
        &self,
        resource: &mut Resource,
        status: ResourceStatus,
        message: Option<String>,
    ) -> Result<()> {
        resource.set_status(status, message);
        put_typed(self.docstore.as_ref(), ns::RESOURCES, &resource.id, resource).await?;
        self.notify(resource);
        Ok(())
    }

    async fn process(&self, event: &IngestEvent) -> Result<()> {
        let mut resource: Resource = get_typed(
            self.docstore.as_ref(),
            ns::RESOURCES,
            &event.data.resource_id,
        )
        .await?
        .ok_or_else(|| PassageError::NotFound {
            kind: "resource",
            id: event.data.resource_id.clone(),
        })?;

        match event.event {
            IngestAction::Load => self.load(&mut resource, event).await,
            IngestAction::Chunk => self.chunk(&mut resource).await,
            IngestAction::Delete => self.delete(&mut resource).await,
            IngestAction::Update => {
                // Placeholder for visibility changes.
                debug!(resource = %resource.id, "update event is a no-op");
                Ok(())
            }
        }
    }

    async fn load(&self, resource: &mut Resource, event: &IngestEvent) -> Result<()> {
        let url = event
            .data
            .url
            .clone()
            .or_else(|| resource.url.clone())
            .ok_or_else(|| PassageError::Loader(format!("resource {} has no url", resource.id)))?;
        let fetched = self.loader.fetch(&url).await?;

        // Unchanged source: nothing to re-chunk.
        if let Some(existing) = &resource.content {
            if content_hash(existing) == content_hash(&fetched) {
                info!(resource = %resource.id, "content unchanged, skipping re-chunk");
                return self
                    .save_with_status(resource, ResourceStatus::Chunked, None)
                    .await;
            }
        }

        resource.content = Some(fetched);
        resource.refreshed_at = Utc::now();
        self.save_with_status(resource, ResourceStatus::Loaded, None)
            .await?;

        // Next stage only after this one is durable.
        let follow_up = IngestEvent::new(
            IngestAction::Chunk,
            IngestData {
                resource_id: resource.id.clone(),
                collection_id: resource.collection_id.clone(),
                url: None,
            },
        );
        self.broker
            .publish(INGEST_QUEUE, serde_json::to_value(&follow_up)?)
            .await
    }

    async fn chunk(&self, resource: &mut Resource) -> Result<()> {
        let settings = self.collections.settings(&resource.collection_id).await?;
        let mut processor = DocumentProcessor::new(
            resource.clone(),
            settings,
            self.embedder.clone(),
            self.broker.clone(),
        );
        processor.chunk().await?.encode().await?.store().await?;
        self.save_with_status(resource, ResourceStatus::Chunked, None)
            .await
    }

    async fn delete(&self, resource: &mut Resource) -> Result<()> {
        let settings = self.collections.settings(&resource.collection_id).await?;
        let processor = DocumentProcessor::new(
            resource.clone(),
            settings,
            self.embedder.clone(),
            self.broker.clone(),
        );
        processor.delete().await?;
        self.save_with_status(resource, ResourceStatus::Deleted, None)
            .await
    }
}

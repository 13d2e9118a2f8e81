//! Resource lifecycle: create, update, soft delete, chunk listing.
//!
//! Mutations publish ingest events rather than running the pipeline
//! inline; the ingestion worker drives load → chunk → persist and reports
//! status through resource metadata and the realtime channel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use passage_core::{
    ChunkOverrides, Chunk, IngestAction, IngestData, IngestEvent, PassageError, Resource, Result,
    INGEST_QUEUE,
};

use crate::broker::Broker;
use crate::collections::CollectionService;
use crate::docstore::{get_typed, list_typed, ns, put_typed, DocStore};

/// Creation request for a resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResource {
    pub collection_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub chunk_overrides: Option<ChunkOverrides>,
}

/// Mutable fields of a resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResource {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub chunk_overrides: Option<ChunkOverrides>,
}

pub struct ResourceService {
    docstore: Arc<dyn DocStore>,
    collections: Arc<CollectionService>,
    broker: Arc<dyn Broker>,
}

impl ResourceService {
    pub fn new(
        docstore: Arc<dyn DocStore>,
        collections: Arc<CollectionService>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        Self {
            docstore,
            collections,
            broker,
        }
    }

    async fn publish_ingest(&self, action: IngestAction, resource: &Resource) -> Result<()> {
        let event = IngestEvent::new(
            action,
            IngestData {
                resource_id: resource.id.clone(),
                collection_id: resource.collection_id.clone(),
                url: resource.url.clone(),
            },
        );
        self.broker
            .publish(INGEST_QUEUE, serde_json::to_value(&event)?)
            .await
    }

    /// Persist a new resource and kick off its ingestion.
    ///
    /// A resource with a URL starts at `load`; a resource created with
    /// inline content skips straight to `chunk`.
    pub async fn create(&self, request: CreateResource) -> Result<Resource> {
        // Creating under a missing collection is a client error.
        self.collections.get(&request.collection_id).await?;
        if request.url.is_none() && request.content.is_none() {
            return Err(PassageError::Validation(
                "resource needs url or content".into(),
            ));
        }

        let resource = Resource {
            id: Uuid::new_v4().to_string(),
            collection_id: request.collection_id,
            owner_id: request.owner_id.unwrap_or_else(passage_core::resource::default_owner),
            title: request.title,
            url: request.url,
            content: request.content,
            description: request.description,
            metadata: request.metadata.unwrap_or_default(),
            chunk_overrides: request.chunk_overrides,
            refreshed_at: Utc::now(),
            is_deleted: false,
        };
        put_typed(self.docstore.as_ref(), ns::RESOURCES, &resource.id, &resource).await?;

        let action = if resource.url.is_some() {
            IngestAction::Load
        } else {
            IngestAction::Chunk
        };
        self.publish_ingest(action, &resource).await?;
        info!(resource = %resource.id, ?action, "created resource");
        Ok(resource)
    }

    pub async fn get(&self, id: &str) -> Result<Resource> {
        get_typed(self.docstore.as_ref(), ns::RESOURCES, id)
            .await?
            .ok_or_else(|| PassageError::NotFound {
                kind: "resource",
                id: id.to_string(),
            })
    }

    /// Apply field updates; content or URL changes re-enter the pipeline.
    pub async fn update(&self, id: &str, update: UpdateResource) -> Result<Resource> {
        let mut resource = self.get(id).await?;
        let mut reingest: Option<IngestAction> = None;

        if let Some(title) = update.title {
            resource.title = Some(title);
        }
        if let Some(description) = update.description {
            resource.description = Some(description);
        }
        if let Some(metadata) = update.metadata {
            resource.metadata.extend(metadata);
        }
        if let Some(overrides) = update.chunk_overrides {
            resource.chunk_overrides = Some(overrides);
        }
        if let Some(url) = update.url {
            if resource.url.as_deref() != Some(url.as_str()) {
                resource.url = Some(url);
                reingest = Some(IngestAction::Load);
            }
        }
        if let Some(content) = update.content {
            if resource.content.as_deref() != Some(content.as_str()) {
                resource.content = Some(content);
                resource.refreshed_at = Utc::now();
                reingest = Some(IngestAction::Chunk);
            }
        }

        put_typed(self.docstore.as_ref(), ns::RESOURCES, id, &resource).await?;
        if let Some(action) = reingest {
            self.publish_ingest(action, &resource).await?;
        }
        Ok(resource)
    }

    /// Soft-delete and emit the purge event.
    pub async fn delete(&self, id: &str) -> Result<Resource> {
        let mut resource = self.get(id).await?;
        resource.is_deleted = true;
        put_typed(self.docstore.as_ref(), ns::RESOURCES, id, &resource).await?;
        self.publish_ingest(IngestAction::Delete, &resource).await?;
        info!(resource = %resource.id, "soft-deleted resource");
        Ok(resource)
    }

    /// Chunks of a resource as synced into the document store.
    pub async fn chunks(&self, id: &str) -> Result<Vec<Chunk>> {
        // 404 for unknown resources.
        self.get(id).await?;
        let chunks: Vec<Chunk> = list_typed(self.docstore.as_ref(), ns::CHUNKS)
            .await?
            .into_iter()
            .filter(|c: &Chunk| c.resource_id == id)
            .collect();
        Ok(chunks)
    }
}

//! Collection lifecycle: create, fetch (with settings cache), update.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use passage_chunk::RemoteChunker;
use passage_core::{
    ChunkStrategy, Collection, CollectionSettings, PassageError, Resource, Result,
    UpdateCollection,
};
use passage_embed::{is_valid_dense, is_valid_reranker, is_valid_sparse};

use crate::cache::TtlCache;
use crate::docstore::{get_typed, list_typed, ns, put_typed, DocStore};

/// Creation request for a collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollection {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
    pub settings: CollectionSettings,
}

/// A page of resources plus listing metadata.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListing {
    pub resources: Vec<Resource>,
    pub metadata: ListingMetadata,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ListingMetadata {
    pub total: usize,
}

/// Collection CRUD over the document store, with a short-TTL settings
/// cache in front of `get`.
pub struct CollectionService {
    docstore: Arc<dyn DocStore>,
    cache: Arc<dyn TtlCache>,
    cache_ttl: Duration,
}

fn cache_key(id: &str) -> String {
    format!("collection:{id}")
}

impl CollectionService {
    pub fn new(docstore: Arc<dyn DocStore>, cache: Arc<dyn TtlCache>, cache_ttl: Duration) -> Self {
        Self {
            docstore,
            cache,
            cache_ttl,
        }
    }

    /// Validate settings (models, chunk bounds, custom endpoint probe) and
    /// persist a new collection.
    pub async fn create(&self, request: CreateCollection) -> Result<Collection> {
        if request.name.trim().is_empty() {
            return Err(PassageError::Validation("name is required".into()));
        }
        let settings = request.settings;
        settings.validate()?;
        if !is_valid_dense(&settings.dense_model) {
            return Err(PassageError::Validation(format!(
                "unsupported dense model '{}'",
                settings.dense_model
            )));
        }
        if let Some(sparse) = &settings.sparse_model {
            if !is_valid_sparse(sparse) {
                return Err(PassageError::Validation(format!(
                    "unsupported sparse model '{sparse}'"
                )));
            }
        }
        if let Some(reranker) = &settings.reranker_model {
            if !is_valid_reranker(reranker) {
                return Err(PassageError::Validation(format!(
                    "unsupported reranker model '{reranker}'"
                )));
            }
        }
        if settings.strategy == ChunkStrategy::Custom {
            let url = settings
                .chunking_url
                .as_deref()
                .ok_or_else(|| PassageError::Validation("strategy=custom requires chunkingUrl".into()))?;
            RemoteChunker::probe(url).await?;
        }

        let now = Utc::now();
        let collection = Collection {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            description: request.description,
            metadata: request.metadata.unwrap_or_default(),
            settings,
            created_at: now,
            updated_at: now,
        };
        put_typed(
            self.docstore.as_ref(),
            ns::COLLECTIONS,
            &collection.id,
            &collection,
        )
        .await?;
        info!(collection = %collection.id, name = %collection.name, "created collection");
        Ok(collection)
    }

    /// Fetch a collection, serving repeat reads from the settings cache.
    pub async fn get(&self, id: &str) -> Result<Collection> {
        let key = cache_key(id);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(collection) = serde_json::from_value::<Collection>(cached) {
                return Ok(collection);
            }
        }
        let collection: Collection = get_typed(self.docstore.as_ref(), ns::COLLECTIONS, id)
            .await?
            .ok_or_else(|| PassageError::NotFound {
                kind: "collection",
                id: id.to_string(),
            })?;
        self.cache
            .set(&key, serde_json::to_value(&collection)?, self.cache_ttl)
            .await;
        Ok(collection)
    }

    /// Convenience accessor for just the settings.
    pub async fn settings(&self, id: &str) -> Result<CollectionSettings> {
        Ok(self.get(id).await?.settings)
    }

    /// Apply a chunking-settings update and invalidate the cache entry.
    pub async fn update(&self, id: &str, update: UpdateCollection) -> Result<Collection> {
        let mut collection = self.get(id).await?;
        collection.apply_update(update)?;
        put_typed(self.docstore.as_ref(), ns::COLLECTIONS, id, &collection).await?;
        self.cache.del(&cache_key(id)).await;
        Ok(collection)
    }

    /// Resources of a collection, optionally scoped to an owner and with
    /// content stripped unless requested.
    pub async fn list_resources(
        &self,
        collection_id: &str,
        owner_id: Option<&str>,
        include_content: bool,
    ) -> Result<ResourceListing> {
        // 404 for unknown collections, not an empty listing.
        self.get(collection_id).await?;

        let mut resources: Vec<Resource> = list_typed(self.docstore.as_ref(), ns::RESOURCES)
            .await?
            .into_iter()
            .filter(|r: &Resource| r.collection_id == collection_id && !r.is_deleted)
            .filter(|r| owner_id.map(|owner| r.owner_id == owner).unwrap_or(true))
            .collect();
        resources.sort_by(|a, b| a.refreshed_at.cmp(&b.refreshed_at));
        if !include_content {
            for resource in &mut resources {
                resource.content = None;
            }
        }
        let total = resources.len();
        Ok(ResourceListing {
            resources,
            metadata: ListingMetadata { total },
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::MemoryTtlCache;
    use crate::docstore::MemoryDocStore;

    use super::*;

    fn service() -> CollectionService {
        CollectionService::new(
            Arc::new(MemoryDocStore::new()),
            Arc::new(MemoryTtlCache::new()),
            Duration::from_secs(60),
        )
    }

    fn request() -> CreateCollection {
        CreateCollection {
            name: "docs".into(),
            description: None,
            metadata: None,
            settings: CollectionSettings {
                dense_model: "BAAI/bge-small-en-v1.5".into(),
                sparse_model: None,
                reranker_model: None,
                chunk_size: 512,
                chunk_overlap: 64,
                strategy: ChunkStrategy::Recursive,
                chunking_url: None,
                keep_duplicate: false,
            },
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let service = service();
        let created = service.create(request()).await.unwrap();
        let fetched = service.get(&created.id).await.unwrap();
        assert_eq!(fetched.name, "docs");
        assert_eq!(fetched.settings.chunk_size, 512);
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let service = service();
        let mut bad = request();
        bad.settings.dense_model = "made/up".into();
        let err = service.create(bad).await.unwrap_err();
        assert!(matches!(err, PassageError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_collection_is_not_found() {
        let service = service();
        let err = service.get("nope").await.unwrap_err();
        assert!(matches!(err, PassageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_only_touches_chunking() {
        let service = service();
        let created = service.create(request()).await.unwrap();
        let updated = service
            .update(
                &created.id,
                UpdateCollection {
                    chunk_size: Some(256),
                    chunk_overlap: None,
                    strategy: None,
                    chunking_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.settings.chunk_size, 256);
        assert_eq!(updated.settings.dense_model, "BAAI/bge-small-en-v1.5");
        // The next get sees the update, not a stale cache entry.
        assert_eq!(service.get(&created.id).await.unwrap().settings.chunk_size, 256);
    }
}

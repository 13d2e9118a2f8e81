//! Per-collection adapter cache and training entry points.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use passage_core::Result;

use crate::linear::LinearAdapter;
use crate::persistence::{AdapterRecord, AdapterStore};

/// Caches one adapter instance per collection in front of an
/// [`AdapterStore`]. Eviction is manual via [`clear_cache`].
///
/// Adapter state is not safe for simultaneous train + transform; the
/// per-collection mutex serializes access, and the feedback consumer's
/// single-threaded policy keeps training itself sequential.
///
/// [`clear_cache`]: AdapterService::clear_cache
pub struct AdapterService {
    store: Arc<dyn AdapterStore>,
    cache: RwLock<HashMap<String, Arc<Mutex<LinearAdapter>>>>,
}

impl AdapterService {
    pub fn new(store: Arc<dyn AdapterStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Cached adapter, loading from storage on miss. `None` when the
    /// collection has never trained.
    async fn get(&self, collection_id: &str) -> Result<Option<Arc<Mutex<LinearAdapter>>>> {
        if let Some(adapter) = self.cache.read().await.get(collection_id) {
            return Ok(Some(adapter.clone()));
        }
        let Some(record) = self.store.load(collection_id).await? else {
            return Ok(None);
        };
        let adapter = Arc::new(Mutex::new(record.into_adapter()?));
        self.cache
            .write()
            .await
            .insert(collection_id.to_string(), adapter.clone());
        Ok(Some(adapter))
    }

    /// Transform a query vector when a trained adapter exists.
    ///
    /// Returns `None` when there is no adapter or it has never trained —
    /// callers fall back to the untransformed vector.
    pub async fn transform(&self, collection_id: &str, query: &[f32]) -> Result<Option<Vec<f32>>> {
        let Some(adapter) = self.get(collection_id).await? else {
            return Ok(None);
        };
        let adapter = adapter.lock().await;
        if adapter.training_count() == 0 {
            return Ok(None);
        }
        adapter.transform(query).map(Some)
    }

    /// Train on one feedback pair: the query vector and the upvoted chunk's
    /// vector. Creates an identity adapter sized to the query on first use,
    /// then persists the updated record.
    pub async fn train_with_feedback(
        &self,
        collection_id: &str,
        query_vector: &[f32],
        chunk_vector: &[f32],
    ) -> Result<()> {
        let adapter = match self.get(collection_id).await? {
            Some(adapter) => adapter,
            None => {
                debug!(
                    collection = collection_id,
                    dim = query_vector.len(),
                    "initializing adapter"
                );
                let fresh = Arc::new(Mutex::new(LinearAdapter::identity(query_vector.len())));
                self.cache
                    .write()
                    .await
                    .insert(collection_id.to_string(), fresh.clone());
                fresh
            }
        };

        let record = {
            let mut adapter = adapter.lock().await;
            adapter.train(
                &[query_vector.to_vec()],
                &[chunk_vector.to_vec()],
            )?;
            AdapterRecord::from_adapter(&adapter)
        };
        self.store.save(collection_id, &record).await?;
        Ok(())
    }

    /// Current training count, 0 when no adapter exists.
    pub async fn training_count(&self, collection_id: &str) -> Result<u64> {
        match self.get(collection_id).await? {
            Some(adapter) => Ok(adapter.lock().await.training_count()),
            None => Ok(0),
        }
    }

    /// Drop the cached instance for one collection.
    pub async fn clear_cache(&self, collection_id: &str) {
        if self.cache.write().await.remove(collection_id).is_some() {
            debug!(collection = collection_id, "evicted cached adapter");
        } else {
            warn!(collection = collection_id, "clear_cache on uncached collection");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    /// In-memory store for exercising the service without a filesystem.
    #[derive(Default)]
    struct MapStore {
        records: RwLock<HashMap<String, AdapterRecord>>,
    }

    #[async_trait]
    impl AdapterStore for MapStore {
        async fn load(&self, collection_id: &str) -> Result<Option<AdapterRecord>> {
            Ok(self.records.read().await.get(collection_id).cloned())
        }

        async fn save(&self, collection_id: &str, record: &AdapterRecord) -> Result<()> {
            self.records
                .write()
                .await
                .insert(collection_id.to_string(), record.clone());
            Ok(())
        }

        async fn delete(&self, collection_id: &str) -> Result<()> {
            self.records.write().await.remove(collection_id);
            Ok(())
        }
    }

    fn unit(mut v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
        v
    }

    #[tokio::test]
    async fn untrained_collection_transforms_to_none() {
        let service = AdapterService::new(Arc::new(MapStore::default()));
        let out = service.transform("col", &[1.0, 0.0]).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn feedback_training_persists_and_transforms() {
        let service = AdapterService::new(Arc::new(MapStore::default()));
        let q = unit(vec![1.0, 0.4, 0.0, 0.1]);
        let c = unit(vec![0.3, 1.0, 0.2, 0.0]);

        for _ in 0..10 {
            service.train_with_feedback("col", &q, &c).await.unwrap();
        }
        assert_eq!(service.training_count("col").await.unwrap(), 10);

        let transformed = service.transform("col", &q).await.unwrap().unwrap();
        let norm: f32 = transformed.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn cache_eviction_reloads_from_store() {
        let store = Arc::new(MapStore::default());
        let service = AdapterService::new(store.clone());
        let q = unit(vec![1.0, 0.0]);
        let c = unit(vec![0.0, 1.0]);
        service.train_with_feedback("col", &q, &c).await.unwrap();

        service.clear_cache("col").await;
        // Reload pulls the persisted record, training count intact.
        assert_eq!(service.training_count("col").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_surfaces_from_transform() {
        let service = AdapterService::new(Arc::new(MapStore::default()));
        let q = unit(vec![1.0, 0.0]);
        let c = unit(vec![0.0, 1.0]);
        service.train_with_feedback("col", &q, &c).await.unwrap();
        let err = service.transform("col", &[1.0, 0.0, 0.0]).await;
        assert!(err.is_err());
    }
}

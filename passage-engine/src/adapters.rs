//! Document-store backend for adapter records, interchangeable with the
//! file backend by configuration.

use std::sync::Arc;

use async_trait::async_trait;

use passage_adapter::{AdapterRecord, AdapterStore};
use passage_core::Result;

use crate::docstore::{get_typed, ns, put_typed, DocStore};

/// Persists adapter records in the `adapters` namespace of the document
/// store.
pub struct DocAdapterStore {
    docstore: Arc<dyn DocStore>,
}

impl DocAdapterStore {
    pub fn new(docstore: Arc<dyn DocStore>) -> Self {
        Self { docstore }
    }
}

#[async_trait]
impl AdapterStore for DocAdapterStore {
    async fn load(&self, collection_id: &str) -> Result<Option<AdapterRecord>> {
        get_typed(self.docstore.as_ref(), ns::ADAPTERS, collection_id).await
    }

    async fn save(&self, collection_id: &str, record: &AdapterRecord) -> Result<()> {
        put_typed(self.docstore.as_ref(), ns::ADAPTERS, collection_id, record).await
    }

    async fn delete(&self, collection_id: &str) -> Result<()> {
        self.docstore.delete(ns::ADAPTERS, collection_id).await
    }
}

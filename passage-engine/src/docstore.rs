//! Namespaced JSON key-value document store.
//!
//! The pipeline needs nothing richer than get/put/delete/list per
//! namespace; richer query shapes are filtered client-side by the
//! services.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use passage_core::Result;

/// Well-known namespaces.
pub mod ns {
    pub const COLLECTIONS: &str = "collections";
    pub const RESOURCES: &str = "resources";
    pub const CHUNKS: &str = "chunks";
    pub const FEEDBACK: &str = "feedback";
    pub const EVAL_CASES: &str = "eval_cases";
    pub const EVAL_RUNS: &str = "eval_runs";
    pub const ANALYTICS: &str = "analytics";
    pub const ADAPTERS: &str = "adapters";
}

/// Key-value semantics over JSON documents, namespaced by record kind.
#[async_trait]
pub trait DocStore: Send + Sync {
    async fn get(&self, ns: &str, id: &str) -> Result<Option<Value>>;
    async fn put(&self, ns: &str, id: &str, doc: Value) -> Result<()>;
    async fn delete(&self, ns: &str, id: &str) -> Result<()>;
    async fn list(&self, ns: &str) -> Result<Vec<Value>>;
}

/// Fetch and deserialize one record.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn DocStore,
    ns: &str,
    id: &str,
) -> Result<Option<T>> {
    match store.get(ns, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and store one record.
pub async fn put_typed<T: Serialize>(
    store: &dyn DocStore,
    ns: &str,
    id: &str,
    doc: &T,
) -> Result<()> {
    store.put(ns, id, serde_json::to_value(doc)?).await
}

/// List and deserialize a namespace, skipping records that no longer parse.
pub async fn list_typed<T: DeserializeOwned>(store: &dyn DocStore, ns: &str) -> Result<Vec<T>> {
    Ok(store
        .list(ns)
        .await?
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

/// In-memory [`DocStore`].
#[derive(Debug, Default)]
pub struct MemoryDocStore {
    namespaces: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryDocStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocStore for MemoryDocStore {
    async fn get(&self, ns: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(ns)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn put(&self, ns: &str, id: &str, doc: Value) -> Result<()> {
        self.namespaces
            .write()
            .await
            .entry(ns.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn delete(&self, ns: &str, id: &str) -> Result<()> {
        if let Some(records) = self.namespaces.write().await.get_mut(ns) {
            records.remove(id);
        }
        Ok(())
    }

    async fn list(&self, ns: &str) -> Result<Vec<Value>> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(ns)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn put_get_delete_cycle() {
        let store = MemoryDocStore::new();
        store
            .put(ns::RESOURCES, "r1", json!({"id": "r1"}))
            .await
            .unwrap();
        assert!(store.get(ns::RESOURCES, "r1").await.unwrap().is_some());
        // Namespaces are isolated.
        assert!(store.get(ns::CHUNKS, "r1").await.unwrap().is_none());
        store.delete(ns::RESOURCES, "r1").await.unwrap();
        assert!(store.get(ns::RESOURCES, "r1").await.unwrap().is_none());
    }
}

//! Adapter persistence: one JSON record per collection.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use passage_core::{PassageError, Result};

use crate::linear::LinearAdapter;

/// The persisted wire format:
/// `{weights[D][D], bias[D], inputDim, outputDim, trainingCount}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterRecord {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub input_dim: usize,
    pub output_dim: usize,
    pub training_count: u64,
}

impl AdapterRecord {
    pub fn from_adapter(adapter: &LinearAdapter) -> Self {
        let (weights, bias) = adapter.to_parts();
        Self {
            weights,
            bias,
            input_dim: adapter.dim(),
            output_dim: adapter.dim(),
            training_count: adapter.training_count(),
        }
    }

    pub fn into_adapter(self) -> Result<LinearAdapter> {
        if self.input_dim != self.output_dim || self.bias.len() != self.input_dim {
            return Err(PassageError::Adapter(format!(
                "inconsistent record dims: input {}, output {}, bias {}",
                self.input_dim,
                self.output_dim,
                self.bias.len()
            )));
        }
        LinearAdapter::from_parts(self.weights, self.bias, self.training_count)
    }
}

/// Storage backend for adapter records. File and document-store backends
/// are interchangeable by configuration.
#[async_trait]
pub trait AdapterStore: Send + Sync {
    async fn load(&self, collection_id: &str) -> Result<Option<AdapterRecord>>;
    async fn save(&self, collection_id: &str, record: &AdapterRecord) -> Result<()>;
    async fn delete(&self, collection_id: &str) -> Result<()>;
}

/// File backend: `<storage_path>/<collectionId>.json`.
pub struct FileAdapterStore {
    dir: PathBuf,
}

impl FileAdapterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, collection_id: &str) -> PathBuf {
        self.dir.join(format!("{collection_id}.json"))
    }
}

#[async_trait]
impl AdapterStore for FileAdapterStore {
    async fn load(&self, collection_id: &str) -> Result<Option<AdapterRecord>> {
        let path = self.path(collection_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes)?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, collection_id: &str, record: &AdapterRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec(record)?;
        tokio::fs::write(self.path(collection_id), bytes).await?;
        debug!(collection = collection_id, "saved adapter record");
        Ok(())
    }

    async fn delete(&self, collection_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(collection_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAdapterStore::new(dir.path());
        assert!(store.load("col").await.unwrap().is_none());

        let adapter = LinearAdapter::identity(3);
        let record = AdapterRecord::from_adapter(&adapter);
        store.save("col", &record).await.unwrap();

        let loaded = store.load("col").await.unwrap().unwrap();
        assert_eq!(loaded.input_dim, 3);
        assert_eq!(loaded.output_dim, 3);
        assert_eq!(loaded.training_count, 0);
        assert_eq!(loaded.weights[0], vec![1.0, 0.0, 0.0]);

        store.delete("col").await.unwrap();
        assert!(store.load("col").await.unwrap().is_none());
    }

    #[test]
    fn record_wire_format_is_camel_case() {
        let record = AdapterRecord::from_adapter(&LinearAdapter::identity(2));
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("inputDim").is_some());
        assert!(value.get("trainingCount").is_some());
    }
}

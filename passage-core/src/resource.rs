//! Resources: source documents owned by a collection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::ChunkStrategy;

/// Pipeline state of a resource, tracked in its metadata under `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Content has been fetched and stored on the record.
    Loaded,
    /// Chunks have been produced and persist events emitted.
    Chunked,
    /// The resource was soft-deleted and its points purged.
    Deleted,
    /// The last pipeline stage failed; `message` carries the cause.
    Error,
}

/// Status value written into `Resource::metadata["status"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-resource chunking overrides, preferred over collection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ChunkStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking_url: Option<String>,
}

/// A source document belonging to one collection, scoped by owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub collection_id: String,
    /// Tenant scope; `"public"` when the caller does not supply one.
    #[serde(default = "default_owner")]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form metadata; the pipeline reserves the `status` key.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_overrides: Option<ChunkOverrides>,
    pub refreshed_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Default tenant for unscoped resources and queries.
pub fn default_owner() -> String {
    "public".to_string()
}

impl Resource {
    /// Write the pipeline status into the metadata map.
    pub fn set_status(&mut self, status: ResourceStatus, message: Option<String>) {
        let info = StatusInfo { status, message };
        if let Ok(value) = serde_json::to_value(&info) {
            self.metadata.insert("status".to_string(), value);
        }
    }

    /// Read the pipeline status back out of the metadata map.
    pub fn status(&self) -> Option<StatusInfo> {
        self.metadata
            .get("status")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

//! Chunks: retrieval-sized passages with their vectors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An `(indices, values)` bag-of-terms representation (SPLADE-style).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Dot product against another sparse vector. Indices need not be sorted.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let lookup: HashMap<u32, f32> = other
            .indices
            .iter()
            .copied()
            .zip(other.values.iter().copied())
            .collect();
        self.indices
            .iter()
            .zip(self.values.iter())
            .filter_map(|(idx, val)| lookup.get(idx).map(|other_val| val * other_val))
            .sum()
    }
}

/// A unit of retrieval: one passage of a resource plus the vectors the
/// collection's models produced for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Stable id; content-addressed unless the collection keeps duplicates.
    pub id: String,
    /// Display text returned to callers.
    pub data: String,
    /// Text that was actually embedded, when different from `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_source: Option<String>,
    pub resource_id: String,
    pub collection_id: String,
    pub owner_id: String,
    /// Dense embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Sparse embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_vector: Option<SparseVector>,
    /// Late-interaction token matrix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_vector: Option<Vec<Vec<f32>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Chunk {
    /// The text handed to the encoders: `vector_source` when present,
    /// otherwise the display text.
    pub fn embed_text(&self) -> &str {
        self.vector_source.as_deref().unwrap_or(&self.data)
    }
}

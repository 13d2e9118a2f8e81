//! Point, payload, and filter types for the vector index contract.

use serde_json::{Map, Value};

use passage_core::{Chunk, SparseVector};

/// Shape of a vector collection, derived from its first upserted point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Dimension of the named `dense` vector.
    pub dense_dim: usize,
    /// Whether the collection carries a named `sparse` vector.
    pub sparse: bool,
    /// Token dimension of the named `rerank` multi-vector, when present.
    pub rerank_dim: Option<usize>,
}

/// One point: id, named vectors, and a JSON payload.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub rerank: Option<Vec<Vec<f32>>>,
    pub payload: Map<String, Value>,
}

impl VectorPoint {
    /// Derive the collection spec this point implies.
    pub fn spec(&self) -> CollectionSpec {
        CollectionSpec {
            dense_dim: self.dense.len(),
            sparse: self.sparse.is_some(),
            rerank_dim: self
                .rerank
                .as_ref()
                .and_then(|m| m.first())
                .map(|row| row.len()),
        }
    }
}

/// A retrieved point with its similarity (or fused) score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
}

/// Exact-match conditions over payload fields, ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFilter {
    pub must: Vec<(String, String)>,
}

impl PointFilter {
    /// Tenant filter: `ownerId == owner`.
    pub fn owner(owner: &str) -> Self {
        Self {
            must: vec![("ownerId".to_string(), owner.to_string())],
        }
    }

    /// Add a `resourceId` condition.
    pub fn with_resource(mut self, resource_id: &str) -> Self {
        self.must
            .push(("resourceId".to_string(), resource_id.to_string()));
        self
    }

    /// Purge filter: all points of one resource.
    pub fn resource(resource_id: &str) -> Self {
        Self {
            must: vec![("resourceId".to_string(), resource_id.to_string())],
        }
    }

    /// Whether a payload satisfies every condition.
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.must.iter().all(|(key, expected)| {
            payload
                .get(key)
                .and_then(|v| v.as_str())
                .map(|actual| actual == expected)
                .unwrap_or(false)
        })
    }
}

/// Typed view of the payload stored with every chunk point.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub resource_id: String,
    pub collection_id: String,
    pub owner_id: String,
    pub content: String,
    pub vector_source: Option<String>,
    pub metadata: Option<Value>,
}

impl ChunkPayload {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            resource_id: chunk.resource_id.clone(),
            collection_id: chunk.collection_id.clone(),
            owner_id: chunk.owner_id.clone(),
            content: chunk.data.clone(),
            vector_source: chunk.vector_source.clone(),
            metadata: chunk
                .metadata
                .as_ref()
                .map(|m| Value::Object(m.clone().into_iter().collect())),
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("resourceId".into(), Value::String(self.resource_id));
        map.insert("collectionId".into(), Value::String(self.collection_id));
        map.insert("ownerId".into(), Value::String(self.owner_id));
        map.insert("content".into(), Value::String(self.content));
        if let Some(vs) = self.vector_source {
            map.insert("vectorSource".into(), Value::String(vs));
        }
        if let Some(metadata) = self.metadata {
            map.insert("metadata".into(), metadata);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_requires_every_condition() {
        let mut payload = Map::new();
        payload.insert("ownerId".into(), Value::String("alice".into()));
        payload.insert("resourceId".into(), Value::String("r1".into()));

        assert!(PointFilter::owner("alice").matches(&payload));
        assert!(!PointFilter::owner("bob").matches(&payload));
        assert!(PointFilter::owner("alice")
            .with_resource("r1")
            .matches(&payload));
        assert!(!PointFilter::owner("alice")
            .with_resource("r2")
            .matches(&payload));
    }

    #[test]
    fn missing_field_fails_the_filter() {
        let payload = Map::new();
        assert!(!PointFilter::owner("alice").matches(&payload));
    }
}

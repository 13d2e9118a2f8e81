//! The vector index capability contract.

use async_trait::async_trait;

use passage_core::{Result, SparseVector};

use crate::types::{CollectionSpec, PointFilter, ScoredPoint, VectorPoint};

/// Named vector carrying the dense embedding.
pub const DENSE_VECTOR: &str = "dense";
/// Named vector carrying the sparse embedding.
pub const SPARSE_VECTOR: &str = "sparse";
/// Named multi-vector carrying the late-interaction matrix.
pub const RERANK_VECTOR: &str = "rerank";

/// Capability surface the rest of the system programs against.
///
/// Engines must create collections lazily from the first upserted point
/// (deriving the named-vector config from its spec) and maintain a keyword
/// payload index on `ownerId` for tenant filtering.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if missing, with the given shape.
    async fn ensure_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()>;

    /// Whether the collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Upsert points; same id overwrites in place. Creates the collection
    /// from the first point when missing.
    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<()>;

    /// Nearest neighbors on the `dense` vector, filtered, scored by cosine.
    async fn dense_query(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredPoint>>;

    /// Hybrid retrieval: dense and sparse prefetches (each `2 × limit`)
    /// fused by Reciprocal Rank Fusion with `k = 60`.
    async fn hybrid_query(
        &self,
        name: &str,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredPoint>>;

    /// Score a candidate id set against the `rerank` multi-vector with
    /// max-sim and return the top `limit`.
    async fn rerank(
        &self,
        name: &str,
        query_matrix: &[Vec<f32>],
        candidate_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    /// Delete every point matching the filter.
    async fn delete_by_filter(&self, name: &str, filter: &PointFilter) -> Result<()>;

    /// Fetch points (with vectors) by id. Unknown ids are skipped.
    async fn retrieve(&self, name: &str, ids: &[String]) -> Result<Vec<VectorPoint>>;
}

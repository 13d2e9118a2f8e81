//! # passage-index
//!
//! The vector index capability surface and two engines behind it.
//!
//! The contract ([`VectorIndex`]) is what the query engine and the persist
//! workers program against: named-vector upsert with create-on-upsert,
//! dense and hybrid (RRF-fused) queries, late-interaction rerank over a
//! candidate set, filtered delete, and retrieve-by-id.
//! [`MemoryVectorIndex`] implements the full surface in process;
//! [`QdrantVectorIndex`] implements it over gRPC.

pub mod memory;
pub mod qdrant;
pub mod rrf;
pub mod store;
pub mod types;

pub use memory::MemoryVectorIndex;
pub use qdrant::QdrantVectorIndex;
pub use rrf::{rrf_fuse, RRF_K};
pub use store::{VectorIndex, DENSE_VECTOR, RERANK_VECTOR, SPARSE_VECTOR};
pub use types::{ChunkPayload, CollectionSpec, PointFilter, ScoredPoint, VectorPoint};

/// Name of the parallel vector collection holding feedback query points.
pub fn feedback_collection(collection_id: &str) -> String {
    format!("feedback_{collection_id}")
}

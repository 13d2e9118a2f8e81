//! # passage-adapter
//!
//! A per-collection linear projection that morphs query vectors toward
//! upvoted chunk vectors. Weights start as the identity (so an untrained
//! adapter is a no-op), train online with Adam on a negative-cosine loss,
//! and persist as a JSON record per collection.
//!
//! Chunk vectors are never touched: adapting only the query side preserves
//! content-addressed idempotence, and rollback is just deleting the record.

pub mod linear;
pub mod persistence;
pub mod service;

pub use linear::{LinearAdapter, SafetyReport};
pub use persistence::{AdapterRecord, AdapterStore, FileAdapterStore};
pub use service::AdapterService;

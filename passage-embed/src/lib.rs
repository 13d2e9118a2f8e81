//! # passage-embed
//!
//! Client for the embedding model server: dense, sparse, and
//! late-interaction encoding over HTTP with length-bucketed batching.
//!
//! Inputs are sorted by length and packed greedily so that no batch wastes
//! more than [`batching::MAX_WASTE_RATIO`] of its padded area; outputs are
//! reassembled into the caller's original order. Each batch carries a
//! sticky `X-Routing-Key` so the server can route like-sized batches to
//! warm workers.

pub mod batching;
pub mod client;
pub mod models;

pub use client::{Embedder, EmbeddingClient};
pub use models::{
    dense_models, describe_model, is_valid_dense, is_valid_reranker, is_valid_sparse,
    reranker_models, sparse_models, EncodingModels, Latency, ModelInfo,
};

//! Descriptor tables for the bounded set of supported models.
//!
//! The model server (fastembed) loads models lazily by name; the tables
//! here gate which names the API accepts and feed the
//! `/utility/encoding-models` catalog endpoint.

use serde::Serialize;

/// Rough latency class of a model, surfaced in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Latency {
    Low,
    Medium,
    High,
}

/// One catalog entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: &'static str,
    pub provider: &'static str,
    pub description: &'static str,
    pub latency: Latency,
    /// Embedding dimension for dense models; 0 for sparse models whose
    /// vocabulary indexes the space.
    pub dimension: usize,
}

const DENSE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "BAAI/bge-small-en-v1.5",
        provider: "BAAI",
        description: "384-dim English embedding, strong default for passage retrieval",
        latency: Latency::Low,
        dimension: 384,
    },
    ModelInfo {
        name: "BAAI/bge-base-en-v1.5",
        provider: "BAAI",
        description: "768-dim English embedding, higher quality at higher cost",
        latency: Latency::Medium,
        dimension: 768,
    },
    ModelInfo {
        name: "sentence-transformers/all-MiniLM-L6-v2",
        provider: "sentence-transformers",
        description: "384-dim general-purpose embedding, very fast",
        latency: Latency::Low,
        dimension: 384,
    },
];

const SPARSE_MODELS: &[ModelInfo] = &[ModelInfo {
    name: "prithivida/Splade_PP_en_v1",
    provider: "prithivida",
    description: "SPLADE++ learned sparse expansion for hybrid retrieval",
    latency: Latency::Medium,
    dimension: 0,
}];

const RERANKER_MODELS: &[ModelInfo] = &[ModelInfo {
    name: "colbert-ir/colbertv2.0",
    provider: "colbert-ir",
    description: "ColBERT v2 late-interaction token matrices, max-sim scored",
    latency: Latency::High,
    dimension: 128,
}];

/// Supported dense models.
pub fn dense_models() -> &'static [ModelInfo] {
    DENSE_MODELS
}

/// Supported sparse models.
pub fn sparse_models() -> &'static [ModelInfo] {
    SPARSE_MODELS
}

/// Supported late-interaction models.
pub fn reranker_models() -> &'static [ModelInfo] {
    RERANKER_MODELS
}

pub fn is_valid_dense(name: &str) -> bool {
    DENSE_MODELS.iter().any(|m| m.name == name)
}

pub fn is_valid_sparse(name: &str) -> bool {
    SPARSE_MODELS.iter().any(|m| m.name == name)
}

pub fn is_valid_reranker(name: &str) -> bool {
    RERANKER_MODELS.iter().any(|m| m.name == name)
}

/// Look a model up across all three tables.
pub fn describe_model(name: &str) -> Option<&'static ModelInfo> {
    DENSE_MODELS
        .iter()
        .chain(SPARSE_MODELS)
        .chain(RERANKER_MODELS)
        .find(|m| m.name == name)
}

/// Catalog response for `/utility/encoding-models`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingModels {
    pub dense_models: &'static [ModelInfo],
    pub sparse_models: &'static [ModelInfo],
    pub reranker_models: &'static [ModelInfo],
}

impl EncodingModels {
    pub fn catalog() -> Self {
        Self {
            dense_models: DENSE_MODELS,
            sparse_models: SPARSE_MODELS,
            reranker_models: RERANKER_MODELS,
        }
    }
}

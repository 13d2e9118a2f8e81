//! # passage-chunk
//!
//! Splitting resource content into retrieval-sized passages.
//!
//! Three strategies: [`RecursiveChunker`] (hierarchical fixed-size),
//! [`SemanticChunker`] (breakpoint detection over sentence embeddings),
//! and [`RemoteChunker`] (delegation to a collection-configured endpoint).
//! The `agentic` strategy name is accepted for wire compatibility and
//! behaves like `recursive`.

pub mod recursive;
pub mod remote;
pub mod semantic;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use passage_core::{ChunkOverrides, ChunkStrategy, CollectionSettings, Result};
use passage_embed::Embedder;

pub use recursive::RecursiveChunker;
pub use remote::RemoteChunker;
pub use semantic::SemanticChunker;

/// One produced passage, before ids and vectors are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPiece {
    /// Display text.
    pub text: String,
    /// Text to embed instead of `text`, when the chunker distinguishes them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl ChunkPiece {
    /// A plain piece with no vector-source override.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            vector_source: None,
            metadata: None,
        }
    }
}

/// A strategy for splitting text into passages.
#[async_trait]
pub trait Chunker: Send + Sync {
    async fn chunk(&self, text: &str) -> Result<Vec<ChunkPiece>>;
}

/// Effective chunking parameters for one resource: collection settings
/// with per-resource overrides applied on top.
#[derive(Debug, Clone)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: ChunkStrategy,
    pub chunking_url: Option<String>,
    pub dense_model: String,
}

impl ChunkParams {
    /// Resolve parameters, preferring resource overrides over collection
    /// settings.
    pub fn resolve(settings: &CollectionSettings, overrides: Option<&ChunkOverrides>) -> Self {
        let mut params = Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            strategy: settings.strategy,
            chunking_url: settings.chunking_url.clone(),
            dense_model: settings.dense_model.clone(),
        };
        if let Some(ov) = overrides {
            if let Some(size) = ov.chunk_size {
                params.chunk_size = size;
            }
            if let Some(overlap) = ov.chunk_overlap {
                params.chunk_overlap = overlap;
            }
            if let Some(strategy) = ov.strategy {
                params.strategy = strategy;
            }
            if let Some(url) = &ov.chunking_url {
                params.chunking_url = Some(url.clone());
            }
        }
        params
    }
}

/// Build the chunker for the resolved parameters.
pub fn chunker_for(params: &ChunkParams, embedder: Arc<dyn Embedder>) -> Arc<dyn Chunker> {
    match params.strategy {
        ChunkStrategy::Recursive => Arc::new(RecursiveChunker::new(
            params.chunk_size,
            params.chunk_overlap,
        )),
        ChunkStrategy::Semantic => Arc::new(SemanticChunker::new(
            semantic::min_chunk_size_for(params.chunk_size),
            params.chunk_size,
            params.dense_model.clone(),
            embedder,
        )),
        ChunkStrategy::Agentic => {
            warn!("agentic chunking is not available, falling back to recursive");
            Arc::new(RecursiveChunker::new(
                params.chunk_size,
                params.chunk_overlap,
            ))
        }
        ChunkStrategy::Custom => match &params.chunking_url {
            Some(url) => Arc::new(RemoteChunker::new(url.clone())),
            None => {
                warn!("strategy=custom without chunkingUrl, falling back to recursive");
                Arc::new(RecursiveChunker::new(
                    params.chunk_size,
                    params.chunk_overlap,
                ))
            }
        },
    }
}

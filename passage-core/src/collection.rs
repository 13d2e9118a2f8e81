//! Collections: named indexes with shared embedding and chunking settings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PassageError, Result};

/// Hard upper bound on a collection's configured chunk size.
pub const MAX_CHUNK_SIZE: usize = 4000;

/// The chunking strategy applied to resources in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Hierarchical fixed-size splitting: paragraphs, then sentences, then words.
    #[default]
    Recursive,
    /// Breakpoint detection over sentence embeddings.
    Semantic,
    /// Reserved strategy name; currently behaves like `Recursive`.
    Agentic,
    /// Delegation to an external chunking endpoint (`chunking_url`).
    Custom,
}

/// Indexing settings shared by every resource of a collection.
///
/// Only the chunking parameters are mutable after creation; changing the
/// encoder once documents exist is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSettings {
    /// Dense embedding model id (required).
    pub dense_model: String,
    /// Optional sparse embedding model id; enables hybrid retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_model: Option<String>,
    /// Optional late-interaction model id; enables rerank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranker_model: Option<String>,
    /// Maximum chunk size in characters (≤ [`MAX_CHUNK_SIZE`]).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters.
    #[serde(default)]
    pub chunk_overlap: usize,
    /// The chunking strategy.
    #[serde(default)]
    pub strategy: ChunkStrategy,
    /// Endpoint for the `custom` strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking_url: Option<String>,
    /// When true, identical chunk content is stored under fresh random ids
    /// instead of being overwritten in place.
    #[serde(default)]
    pub keep_duplicate: bool,
}

fn default_chunk_size() -> usize {
    512
}

impl CollectionSettings {
    /// Validate the structural invariants that do not require I/O.
    ///
    /// Model-name validity and the custom chunking health probe are checked
    /// by the collection service, which has the catalog and an HTTP client.
    pub fn validate(&self) -> Result<()> {
        if self.dense_model.trim().is_empty() {
            return Err(PassageError::Validation("denseModel is required".into()));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(PassageError::Validation(format!(
                "chunkSize must be in 1..={MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PassageError::Validation(format!(
                "chunkOverlap ({}) must be less than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.strategy == ChunkStrategy::Custom && self.chunking_url.is_none() {
            return Err(PassageError::Validation(
                "strategy=custom requires chunkingUrl".into(),
            ));
        }
        Ok(())
    }
}

/// A named logical grouping of resources with immutable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Immutable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Indexing settings.
    pub settings: CollectionSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable subset of a collection: chunking parameters only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollection {
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    #[serde(default)]
    pub strategy: Option<ChunkStrategy>,
    #[serde(default)]
    pub chunking_url: Option<String>,
}

impl Collection {
    /// Apply a chunking-settings update, revalidating the result.
    pub fn apply_update(&mut self, update: UpdateCollection) -> Result<()> {
        let mut next = self.settings.clone();
        if let Some(size) = update.chunk_size {
            next.chunk_size = size;
        }
        if let Some(overlap) = update.chunk_overlap {
            next.chunk_overlap = overlap;
        }
        if let Some(strategy) = update.strategy {
            next.strategy = strategy;
        }
        if let Some(url) = update.chunking_url {
            next.chunking_url = Some(url);
        }
        next.validate()?;
        self.settings = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CollectionSettings {
        CollectionSettings {
            dense_model: "BAAI/bge-small-en-v1.5".into(),
            sparse_model: None,
            reranker_model: None,
            chunk_size: 512,
            chunk_overlap: 64,
            strategy: ChunkStrategy::Recursive,
            chunking_url: None,
            keep_duplicate: false,
        }
    }

    #[test]
    fn validates_chunk_size_bounds() {
        let mut s = settings();
        s.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(s.validate().is_err());
        s.chunk_size = MAX_CHUNK_SIZE;
        s.chunk_overlap = 0;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn custom_strategy_requires_url() {
        let mut s = settings();
        s.strategy = ChunkStrategy::Custom;
        assert!(s.validate().is_err());
        s.chunking_url = Some("http://localhost:9000/chunk".into());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn update_touches_only_chunking_parameters() {
        let mut collection = Collection {
            id: "c1".into(),
            name: "docs".into(),
            description: None,
            metadata: HashMap::new(),
            settings: settings(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        collection
            .apply_update(UpdateCollection {
                chunk_size: Some(256),
                chunk_overlap: Some(32),
                strategy: Some(ChunkStrategy::Semantic),
                chunking_url: None,
            })
            .unwrap();
        assert_eq!(collection.settings.chunk_size, 256);
        assert_eq!(collection.settings.strategy, ChunkStrategy::Semantic);
        assert_eq!(collection.settings.dense_model, "BAAI/bge-small-en-v1.5");
    }

    #[test]
    fn strategy_serializes_lowercase() {
        let json = serde_json::to_string(&ChunkStrategy::Semantic).unwrap();
        assert_eq!(json, "\"semantic\"");
    }
}

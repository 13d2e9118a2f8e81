//! Per-resource pipeline: chunk → encode → store.
//!
//! The processor mutates its chunk set through the three stages and emits
//! persist events at the end; actual writes happen in the persist workers.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use passage_core::{
    chunk_address, Chunk, CollectionSettings, PassageError, PersistAction, PersistData,
    PersistEvent, Resource, Result, CHUNK_EXCHANGE,
};
use passage_chunk::{chunker_for, ChunkParams};
use passage_embed::Embedder;

use crate::broker::Broker;

/// Chunks per persist message when no rerank matrices are attached.
const PERSIST_BATCH: usize = 32;

/// Drives one resource through the pipeline stages.
pub struct DocumentProcessor {
    resource: Resource,
    settings: CollectionSettings,
    embedder: Arc<dyn Embedder>,
    broker: Arc<dyn Broker>,
    chunks: Vec<Chunk>,
}

impl DocumentProcessor {
    pub fn new(
        resource: Resource,
        settings: CollectionSettings,
        embedder: Arc<dyn Embedder>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        Self {
            resource,
            settings,
            embedder,
            broker,
            chunks: Vec::new(),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Split the resource content into chunks with stable ids.
    ///
    /// Ids are content-addressed unless the collection keeps duplicates,
    /// in which case each run mints fresh random ids.
    pub async fn chunk(&mut self) -> Result<&mut Self> {
        let content = self
            .resource
            .content
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                PassageError::Pipeline(format!(
                    "resource {} has no content to chunk",
                    self.resource.id
                ))
            })?;

        let params = ChunkParams::resolve(&self.settings, self.resource.chunk_overrides.as_ref());
        let chunker = chunker_for(&params, self.embedder.clone());
        let pieces = chunker.chunk(&content).await?;

        self.chunks = pieces
            .into_iter()
            .map(|piece| {
                let id = if self.settings.keep_duplicate {
                    Uuid::new_v4().to_string()
                } else {
                    chunk_address(
                        &self.resource.collection_id,
                        &self.resource.owner_id,
                        &piece.text,
                        piece.vector_source.as_deref(),
                    )
                };
                Chunk {
                    id,
                    data: piece.text,
                    vector_source: piece.vector_source,
                    resource_id: self.resource.id.clone(),
                    collection_id: self.resource.collection_id.clone(),
                    owner_id: self.resource.owner_id.clone(),
                    vector: None,
                    sparse_vector: None,
                    rerank_vector: None,
                    metadata: piece.metadata,
                }
            })
            .collect();
        debug!(
            resource = %self.resource.id,
            chunks = self.chunks.len(),
            "chunked resource"
        );
        Ok(self)
    }

    /// Attach the vector set the collection's models call for: dense
    /// always, sparse and rerank when configured.
    pub async fn encode(&mut self) -> Result<&mut Self> {
        if self.chunks.is_empty() {
            return Ok(self);
        }
        let texts: Vec<String> = self
            .chunks
            .iter()
            .map(|c| c.embed_text().to_string())
            .collect();

        let dense = self
            .embedder
            .encode_dense(&texts, &self.settings.dense_model)
            .await?;
        for (chunk, vector) in self.chunks.iter_mut().zip(dense) {
            chunk.vector = Some(vector);
        }

        if let Some(sparse_model) = &self.settings.sparse_model {
            let sparse = self.embedder.encode_sparse(&texts, sparse_model).await?;
            for (chunk, vector) in self.chunks.iter_mut().zip(sparse) {
                chunk.sparse_vector = Some(vector);
            }
        }

        if let Some(reranker_model) = &self.settings.reranker_model {
            let matrices = self
                .embedder
                .encode_late_interaction(&texts, reranker_model)
                .await?;
            for (chunk, matrix) in self.chunks.iter_mut().zip(matrices) {
                chunk.rerank_vector = Some(matrix);
            }
        }
        Ok(self)
    }

    /// Emit upsert persist events on the chunk exchange.
    ///
    /// Rerank matrices make messages too large to batch safely, so each
    /// chunk ships alone when they are present.
    pub async fn store(&mut self) -> Result<&mut Self> {
        let batch_size = if self.settings.reranker_model.is_some() {
            1
        } else {
            PERSIST_BATCH
        };
        let total = self.chunks.len();
        for batch in self.chunks.chunks(batch_size) {
            let event = PersistEvent::new(
                PersistAction::Upsert,
                PersistData {
                    collection_id: self.resource.collection_id.clone(),
                    owner_id: self.resource.owner_id.clone(),
                    resource_id: self.resource.id.clone(),
                    keep_duplicate: self.settings.keep_duplicate,
                    chunks: batch.to_vec(),
                },
            );
            self.broker
                .publish(CHUNK_EXCHANGE, serde_json::to_value(&event)?)
                .await?;
        }
        info!(
            resource = %self.resource.id,
            chunks = total,
            batch_size,
            "emitted persist events"
        );
        Ok(self)
    }

    /// Emit the purge event for this resource.
    pub async fn delete(&self) -> Result<()> {
        let event = PersistEvent::new(
            PersistAction::Delete,
            PersistData {
                collection_id: self.resource.collection_id.clone(),
                owner_id: self.resource.owner_id.clone(),
                resource_id: self.resource.id.clone(),
                keep_duplicate: self.settings.keep_duplicate,
                chunks: Vec::new(),
            },
        );
        self.broker
            .publish(CHUNK_EXCHANGE, serde_json::to_value(&event)?)
            .await
    }
}

//! Persist consumers: one per storage backend, on isolated queues so a
//! slow backend cannot block the others.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use passage_core::{Chunk, PassageError, PersistAction, PersistEvent, Result};
use passage_index::{ChunkPayload, PointFilter, VectorIndex, VectorPoint};

use crate::broker::Broker;
use crate::docstore::{list_typed, ns, put_typed, DocStore};
use crate::workers::run_consumer;

fn chunk_to_point(chunk: &Chunk) -> Result<VectorPoint> {
    let dense = chunk.vector.clone().ok_or_else(|| {
        PassageError::Pipeline(format!("chunk {} reached persist without a dense vector", chunk.id))
    })?;
    Ok(VectorPoint {
        id: chunk.id.clone(),
        dense,
        sparse: chunk.sparse_vector.clone(),
        rerank: chunk.rerank_vector.clone(),
        payload: ChunkPayload::from_chunk(chunk).into_map(),
    })
}

/// Applies persist events to a vector index region.
pub struct VectorSyncWorker {
    index: Arc<dyn VectorIndex>,
    broker: Arc<dyn Broker>,
    queue: &'static str,
}

impl VectorSyncWorker {
    pub fn new(index: Arc<dyn VectorIndex>, broker: Arc<dyn Broker>, queue: &'static str) -> Self {
        Self {
            index,
            broker,
            queue,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let broker = self.broker.clone();
        let queue = self.queue;
        tokio::spawn(async move {
            run_consumer(broker, queue, |message| {
                let worker = self.clone();
                async move { worker.handle(message).await }
            })
            .await;
        })
    }

    async fn handle(&self, message: Value) -> Result<()> {
        let event: PersistEvent = serde_json::from_value(message)?;
        match event.event {
            PersistAction::Upsert => {
                let points: Vec<VectorPoint> = event
                    .data
                    .chunks
                    .iter()
                    .map(chunk_to_point)
                    .collect::<Result<_>>()?;
                debug!(
                    queue = self.queue,
                    collection = %event.data.collection_id,
                    points = points.len(),
                    "syncing points"
                );
                self.index.upsert(&event.data.collection_id, points).await
            }
            PersistAction::Delete => {
                self.index
                    .delete_by_filter(
                        &event.data.collection_id,
                        &PointFilter::resource(&event.data.resource_id),
                    )
                    .await
            }
        }
    }
}

/// Mirrors chunk records into the document store for chunk listings.
pub struct DocSyncWorker {
    docstore: Arc<dyn DocStore>,
    broker: Arc<dyn Broker>,
    queue: &'static str,
}

impl DocSyncWorker {
    pub fn new(docstore: Arc<dyn DocStore>, broker: Arc<dyn Broker>, queue: &'static str) -> Self {
        Self {
            docstore,
            broker,
            queue,
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let broker = self.broker.clone();
        let queue = self.queue;
        tokio::spawn(async move {
            run_consumer(broker, queue, |message| {
                let worker = self.clone();
                async move { worker.handle(message).await }
            })
            .await;
        })
    }

    async fn handle(&self, message: Value) -> Result<()> {
        let event: PersistEvent = serde_json::from_value(message)?;
        match event.event {
            PersistAction::Upsert => {
                for chunk in &event.data.chunks {
                    // Vectors stay in the vector store; the document copy
                    // serves text listings.
                    let mut light = chunk.clone();
                    light.vector = None;
                    light.sparse_vector = None;
                    light.rerank_vector = None;
                    put_typed(self.docstore.as_ref(), ns::CHUNKS, &light.id, &light).await?;
                }
                Ok(())
            }
            PersistAction::Delete => {
                let chunks: Vec<Chunk> = list_typed(self.docstore.as_ref(), ns::CHUNKS).await?;
                for chunk in chunks
                    .iter()
                    .filter(|c| c.resource_id == event.data.resource_id)
                {
                    self.docstore.delete(ns::CHUNKS, &chunk.id).await?;
                }
                Ok(())
            }
        }
    }
}

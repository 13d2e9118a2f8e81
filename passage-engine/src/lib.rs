//! # passage-engine
//!
//! The service layer of the passage retrieval backend: collection and
//! resource lifecycle, the staged ingestion pipeline, the query engine,
//! the feedback loop, the evaluator, and the queue consumers that stitch
//! them together.
//!
//! [`Engine`] wires every service over the capability contracts (document
//! store, TTL cache, broker, vector index, embedder, adapter store), so
//! tests run entirely in process while production swaps in the gRPC and
//! HTTP backends.

pub mod adapters;
pub mod broker;
pub mod cache;
pub mod collections;
pub mod docstore;
pub mod eval;
pub mod feedback;
pub mod loader;
pub mod processor;
pub mod query;
pub mod resources;
pub mod sync;
pub mod workers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use passage_adapter::{AdapterService, AdapterStore, FileAdapterStore};
use passage_core::{
    PassageError, RealtimeMessage, Result, CHUNK_EXCHANGE, DOCSTORE_SYNC_QUEUE,
    VECTOR_SYNC_QUEUE_A, VECTOR_SYNC_QUEUE_B,
};
use passage_embed::Embedder;
use passage_index::VectorIndex;

use crate::broker::{Broker, InProcessBroker};
use crate::cache::{MemoryTtlCache, TtlCache};
use crate::collections::CollectionService;
use crate::docstore::{DocStore, MemoryDocStore};
use crate::eval::Evaluator;
use crate::feedback::FeedbackService;
use crate::loader::DocumentLoader;
use crate::query::QueryEngine;
use crate::resources::ResourceService;
use crate::workers::analytics::AnalyticsWorker;
use crate::workers::feedback::FeedbackWorker;
use crate::workers::ingest::IngestWorker;
use crate::workers::persist::{DocSyncWorker, VectorSyncWorker};

/// Capacity of the realtime status channel.
const REALTIME_CAPACITY: usize = 256;

/// All services wired over shared backends.
pub struct Engine {
    pub docstore: Arc<dyn DocStore>,
    pub cache: Arc<dyn TtlCache>,
    pub broker: Arc<InProcessBroker>,
    pub index: Arc<dyn VectorIndex>,
    pub replica_index: Option<Arc<dyn VectorIndex>>,
    pub embedder: Arc<dyn Embedder>,
    pub adapters: Arc<AdapterService>,
    pub collections: Arc<CollectionService>,
    pub resources: Arc<ResourceService>,
    pub query: Arc<QueryEngine>,
    pub feedback: Arc<FeedbackService>,
    pub evaluator: Arc<Evaluator>,
    pub loader: Arc<DocumentLoader>,
    realtime: broadcast::Sender<RealtimeMessage>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Listen for resource status notifications.
    pub fn subscribe_realtime(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.realtime.subscribe()
    }

    /// Bind the persist fan-out and start every consumer.
    pub async fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        self.broker.bind(CHUNK_EXCHANGE, DOCSTORE_SYNC_QUEUE).await;
        self.broker.bind(CHUNK_EXCHANGE, VECTOR_SYNC_QUEUE_A).await;
        if self.replica_index.is_some() {
            self.broker.bind(CHUNK_EXCHANGE, VECTOR_SYNC_QUEUE_B).await;
        }

        let broker: Arc<dyn Broker> = self.broker.clone();
        let mut handles = Vec::new();

        handles.push(
            Arc::new(IngestWorker::new(
                self.docstore.clone(),
                self.collections.clone(),
                self.embedder.clone(),
                broker.clone(),
                self.loader.clone(),
                self.realtime.clone(),
            ))
            .spawn(),
        );
        handles.push(
            Arc::new(VectorSyncWorker::new(
                self.index.clone(),
                broker.clone(),
                VECTOR_SYNC_QUEUE_A,
            ))
            .spawn(),
        );
        if let Some(replica) = &self.replica_index {
            handles.push(
                Arc::new(VectorSyncWorker::new(
                    replica.clone(),
                    broker.clone(),
                    VECTOR_SYNC_QUEUE_B,
                ))
                .spawn(),
            );
        }
        handles.push(
            Arc::new(DocSyncWorker::new(
                self.docstore.clone(),
                broker.clone(),
                DOCSTORE_SYNC_QUEUE,
            ))
            .spawn(),
        );
        handles.push(
            Arc::new(FeedbackWorker::new(self.feedback.clone(), broker.clone())).spawn(),
        );
        handles.push(Arc::new(AnalyticsWorker::new(self.docstore.clone(), broker)).spawn());
        handles
    }

    /// Start the periodic re-load job for URL-backed resources.
    pub fn spawn_sync_job(&self, interval: Duration) -> JoinHandle<()> {
        let broker: Arc<dyn Broker> = self.broker.clone();
        Arc::new(crate::sync::RagSyncJob::new(self.docstore.clone(), broker)).spawn(interval)
    }
}

/// Builder for [`Engine`]; embedder and vector index are required, the
/// rest defaults to in-memory backends.
#[derive(Default)]
pub struct EngineBuilder {
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    replica_index: Option<Arc<dyn VectorIndex>>,
    docstore: Option<Arc<dyn DocStore>>,
    cache: Option<Arc<dyn TtlCache>>,
    broker: Option<Arc<InProcessBroker>>,
    adapter_store: Option<Arc<dyn AdapterStore>>,
    settings_cache_ttl: Option<Duration>,
}

impl EngineBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn replica_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.replica_index = Some(index);
        self
    }

    pub fn docstore(mut self, docstore: Arc<dyn DocStore>) -> Self {
        self.docstore = Some(docstore);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn TtlCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn broker(mut self, broker: Arc<InProcessBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn adapter_store(mut self, store: Arc<dyn AdapterStore>) -> Self {
        self.adapter_store = Some(store);
        self
    }

    pub fn settings_cache_ttl(mut self, ttl: Duration) -> Self {
        self.settings_cache_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let embedder = self
            .embedder
            .ok_or_else(|| PassageError::Validation("engine needs an embedder".into()))?;
        let index = self
            .index
            .ok_or_else(|| PassageError::Validation("engine needs a vector index".into()))?;
        let docstore = self
            .docstore
            .unwrap_or_else(|| Arc::new(MemoryDocStore::new()));
        let cache = self.cache.unwrap_or_else(|| Arc::new(MemoryTtlCache::new()));
        let broker = self.broker.unwrap_or_else(|| Arc::new(InProcessBroker::new()));
        let adapter_store = self
            .adapter_store
            .unwrap_or_else(|| Arc::new(FileAdapterStore::new("./adapters")));
        let settings_cache_ttl = self.settings_cache_ttl.unwrap_or(Duration::from_secs(60));

        let adapters = Arc::new(AdapterService::new(adapter_store));
        let collections = Arc::new(CollectionService::new(
            docstore.clone(),
            cache.clone(),
            settings_cache_ttl,
        ));
        let broker_dyn: Arc<dyn Broker> = broker.clone();
        let resources = Arc::new(ResourceService::new(
            docstore.clone(),
            collections.clone(),
            broker_dyn.clone(),
        ));
        let query = Arc::new(QueryEngine::new(
            collections.clone(),
            index.clone(),
            embedder.clone(),
            adapters.clone(),
            docstore.clone(),
            cache.clone(),
            broker_dyn.clone(),
        ));
        let feedback = Arc::new(FeedbackService::new(
            collections.clone(),
            index.clone(),
            embedder.clone(),
            adapters.clone(),
            docstore.clone(),
            cache.clone(),
            broker_dyn,
        ));
        let evaluator = Arc::new(Evaluator::new(docstore.clone(), query.clone()));
        let (realtime, _) = broadcast::channel(REALTIME_CAPACITY);

        Ok(Engine {
            docstore,
            cache,
            broker,
            index,
            replica_index: self.replica_index,
            embedder,
            adapters,
            collections,
            resources,
            query,
            feedback,
            evaluator,
            loader: Arc::new(DocumentLoader::new()),
            realtime,
        })
    }
}

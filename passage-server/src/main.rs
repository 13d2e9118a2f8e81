use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use passage_adapter::{AdapterStore, FileAdapterStore};
use passage_core::AppConfig;
use passage_embed::EmbeddingClient;
use passage_engine::adapters::DocAdapterStore;
use passage_engine::docstore::{DocStore, MemoryDocStore};
use passage_engine::Engine;
use passage_index::{MemoryVectorIndex, QdrantVectorIndex, VectorIndex};
use passage_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let embedder = Arc::new(
        EmbeddingClient::new(config.embedding_server_url.clone())
            .context("building embedding client")?,
    );
    let index: Arc<dyn VectorIndex> = match &config.qdrant_url {
        Some(url) => {
            info!(url, "using qdrant vector index");
            Arc::new(
                QdrantVectorIndex::new(url, config.qdrant_api_key.clone())
                    .context("connecting to qdrant")?,
            )
        }
        None => {
            info!("QDRANT_URL unset, using in-memory vector index");
            Arc::new(MemoryVectorIndex::new())
        }
    };
    let docstore: Arc<dyn DocStore> = Arc::new(MemoryDocStore::new());
    let adapter_store: Arc<dyn AdapterStore> = if config.adapter_use_docstore {
        Arc::new(DocAdapterStore::new(docstore.clone()))
    } else {
        Arc::new(FileAdapterStore::new(config.adapter_storage_path.clone()))
    };

    let engine = Arc::new(
        Engine::builder()
            .embedder(embedder)
            .index(index)
            .docstore(docstore)
            .adapter_store(adapter_store)
            .settings_cache_ttl(std::time::Duration::from_secs(
                config.settings_cache_ttl_secs,
            ))
            .build()
            .context("wiring engine")?,
    );
    engine.spawn_workers().await;
    if config.sync_interval_secs > 0 {
        engine.spawn_sync_job(std::time::Duration::from_secs(config.sync_interval_secs));
    }

    let app = passage_server::app_router(AppState::new(engine));
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding listener")?;
    info!("passage listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

//! HTTP client for the embedding model server.
//!
//! The server exposes `/embed`, `/sparse-embed`, and
//! `/late-interaction-embed`, each taking `{texts, model}` and returning
//! `{embeddings}`. Batches are dispatched sequentially per encode call;
//! a batch that still fails after retries fails the whole call — partial
//! embeddings are never returned.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use passage_core::{PassageError, Result, SparseVector};

use crate::batching::pack_batches;

/// Attempts per batch, including the first.
const MAX_RETRIES: u32 = 5;

/// Per-request timeout against the model server.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Encoding capability used by the engine and the chunkers. Implemented by
/// [`EmbeddingClient`] in production and by deterministic fakes in tests.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dense D-dim vectors, one per input text, in input order.
    async fn encode_dense(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;

    /// Sparse `(indices, values)` vectors, one per input text.
    async fn encode_sparse(&self, texts: &[String], model: &str) -> Result<Vec<SparseVector>>;

    /// Late-interaction T×D token matrices, one per input text.
    async fn encode_late_interaction(
        &self,
        texts: &[String],
        model: &str,
    ) -> Result<Vec<Vec<Vec<f32>>>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: Vec<&'a str>,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse<E> {
    embeddings: Vec<E>,
}

/// Batched client for the embedding model server.
pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: String,
}

impl EmbeddingClient {
    /// Create a client against the given server base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PassageError::Embedding {
                model: "-".into(),
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Pack, dispatch, and reassemble one encode call against `path`.
    async fn encode_batched<E: DeserializeOwned + Clone>(
        &self,
        path: &str,
        texts: &[String],
        model: &str,
    ) -> Result<Vec<E>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches = pack_batches(texts);
        debug!(
            model,
            inputs = texts.len(),
            batches = batches.len(),
            "dispatching encode batches"
        );

        let mut out: Vec<Option<E>> = vec![None; texts.len()];
        for batch in &batches {
            let batch_texts: Vec<&str> = batch.iter().map(|(_, t)| t.as_str()).collect();
            // Sticky per batch: retries of the same batch land on the same
            // warm worker.
            let routing_key = format!("{model}:{}", Uuid::new_v4());
            let embeddings: Vec<E> = self
                .dispatch(path, &batch_texts, model, &routing_key)
                .await?;
            if embeddings.len() != batch.len() {
                return Err(PassageError::Embedding {
                    model: model.to_string(),
                    message: format!(
                        "server returned {} embeddings for {} texts",
                        embeddings.len(),
                        batch.len()
                    ),
                });
            }
            for ((original_idx, _), embedding) in batch.iter().zip(embeddings) {
                out[*original_idx] = Some(embedding);
            }
        }

        // Every index was assigned exactly once by construction.
        out.into_iter()
            .map(|slot| {
                slot.ok_or_else(|| PassageError::Embedding {
                    model: model.to_string(),
                    message: "internal: batch reassembly left a gap".into(),
                })
            })
            .collect()
    }

    /// One batch with bounded linear-backoff retries on 5xx or transport
    /// errors.
    async fn dispatch<E: DeserializeOwned>(
        &self,
        path: &str,
        texts: &[&str],
        model: &str,
        routing_key: &str,
    ) -> Result<Vec<E>> {
        let url = format!("{}{path}", self.base_url);
        let mut last_error = String::new();

        for attempt in 1..=MAX_RETRIES {
            let request = EmbedRequest {
                texts: texts.to_vec(),
                model,
            };
            let sent = self
                .http
                .post(&url)
                .header("X-Routing-Key", routing_key)
                .json(&request)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbedResponse<E> =
                        response
                            .json()
                            .await
                            .map_err(|e| PassageError::Embedding {
                                model: model.to_string(),
                                message: format!("failed to parse response: {e}"),
                            })?;
                    return Ok(parsed.embeddings);
                }
                Ok(response) if response.status().is_server_error() => {
                    last_error = format!("server returned {}", response.status());
                }
                Ok(response) => {
                    // 4xx is not retryable: the request itself is wrong.
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(PassageError::Embedding {
                        model: model.to_string(),
                        message: format!("server returned {status}: {body}"),
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < MAX_RETRIES {
                warn!(
                    model,
                    attempt,
                    error = %last_error,
                    "embed batch failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }

        Err(PassageError::Embedding {
            model: model.to_string(),
            message: format!("batch failed after {MAX_RETRIES} attempts: {last_error}"),
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn encode_dense(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        self.encode_batched("/embed", texts, model).await
    }

    async fn encode_sparse(&self, texts: &[String], model: &str) -> Result<Vec<SparseVector>> {
        self.encode_batched("/sparse-embed", texts, model).await
    }

    async fn encode_late_interaction(
        &self,
        texts: &[String],
        model: &str,
    ) -> Result<Vec<Vec<Vec<f32>>>> {
        self.encode_batched("/late-interaction-embed", texts, model)
            .await
    }
}

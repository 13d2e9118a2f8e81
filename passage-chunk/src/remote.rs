//! Delegation to a collection-configured chunking endpoint.
//!
//! The endpoint contract: `GET <url>/health` answers 2xx, and
//! `POST <url>` with `{text}` returns
//! `{chunks: [{text, vectorSource?, metadata?}]}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use passage_core::{PassageError, Result};

use crate::{ChunkPiece, Chunker};

/// Outbound timeout for custom chunking calls.
const CHUNKING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct ChunkRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ChunkResponse {
    chunks: Vec<ChunkPiece>,
}

/// A chunker backed by an external HTTP endpoint.
pub struct RemoteChunker {
    http: reqwest::Client,
    url: String,
}

impl RemoteChunker {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Health-probe a candidate chunking URL. Used at collection creation
    /// to reject endpoints that will fail at ingest time.
    pub async fn probe(url: &str) -> Result<()> {
        let probe_url = format!("{}/health", url.trim_end_matches('/'));
        let client = reqwest::Client::new();
        let response = client
            .get(&probe_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                PassageError::Validation(format!("chunkingUrl health probe failed: {e}"))
            })?;
        if !response.status().is_success() {
            return Err(PassageError::Validation(format!(
                "chunkingUrl health probe returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Chunker for RemoteChunker {
    async fn chunk(&self, text: &str) -> Result<Vec<ChunkPiece>> {
        let response = self
            .http
            .post(&self.url)
            .timeout(CHUNKING_TIMEOUT)
            .json(&ChunkRequest { text })
            .send()
            .await
            .map_err(|e| PassageError::Chunking(format!("custom endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(PassageError::Chunking(format!(
                "custom endpoint returned {}",
                response.status()
            )));
        }

        let parsed: ChunkResponse = response
            .json()
            .await
            .map_err(|e| PassageError::Chunking(format!("custom endpoint bad payload: {e}")))?;
        debug!(chunks = parsed.chunks.len(), "remote chunking complete");
        Ok(parsed.chunks)
    }
}

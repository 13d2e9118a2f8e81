//! The query path: embed → (adapter) → hybrid retrieve → rerank →
//! feedback fusion → truncate.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use passage_adapter::AdapterService;
use passage_core::{
    AnalyticsEvent, FeedbackDoc, PassageError, Result, ANALYTICS_QUEUE,
};
use passage_embed::Embedder;
use passage_index::{feedback_collection, PointFilter, ScoredPoint, VectorIndex};

use crate::broker::Broker;
use crate::cache::TtlCache;
use crate::collections::CollectionService;
use crate::docstore::{get_typed, ns, DocStore};
use crate::feedback::{create_review_link, ReviewLinks};

/// Candidate pool fetched before rerank and fusion.
const CANDIDATE_POOL: usize = 50;

/// Prior queries consulted for feedback fusion.
const FEEDBACK_LOOKUP: usize = 5;

/// Similarity floor for a prior query to contribute feedback.
const FEEDBACK_SIMILARITY: f32 = 0.85;

/// Rerank keeps this many candidates when fusion still follows.
const RERANK_POOL: usize = 20;

/// One search call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub collection_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Result count; the API calls this `limit`.
    #[serde(default = "default_top_k", alias = "limit")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: Option<f32>,
    /// Blend in historical feedback for similar queries.
    #[serde(default)]
    pub use_feedback: bool,
    /// Attach review links to each hit.
    #[serde(default)]
    pub is_review: bool,
    /// Emit an analytics event for this search.
    #[serde(default)]
    pub analytics: bool,
}

fn default_top_k() -> usize {
    5
}

/// One ranked passage.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<ReviewLinks>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub result: Vec<SearchHit>,
}

pub struct QueryEngine {
    collections: Arc<CollectionService>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    adapters: Arc<AdapterService>,
    docstore: Arc<dyn DocStore>,
    cache: Arc<dyn TtlCache>,
    broker: Arc<dyn Broker>,
}

impl QueryEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        collections: Arc<CollectionService>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        adapters: Arc<AdapterService>,
        docstore: Arc<dyn DocStore>,
        cache: Arc<dyn TtlCache>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        Self {
            collections,
            index,
            embedder,
            adapters,
            docstore,
            cache,
            broker,
        }
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        if request.query.trim().is_empty() {
            return Err(PassageError::Validation("query is required".into()));
        }
        let started = Instant::now();
        let settings = self.collections.settings(&request.collection_id).await?;
        let owner = request.owner_id.clone().unwrap_or_else(|| "public".into());

        // Nothing indexed yet: an empty result, not a backend error.
        if !self.index.collection_exists(&request.collection_id).await? {
            return Ok(SearchResponse { result: Vec::new() });
        }

        // Dense, sparse, and late-interaction embeddings in parallel.
        let texts = vec![request.query.clone()];
        let (dense_res, sparse_res, rerank_res) = tokio::join!(
            self.embedder.encode_dense(&texts, &settings.dense_model),
            async {
                match &settings.sparse_model {
                    Some(model) => self.embedder.encode_sparse(&texts, model).await.map(Some),
                    None => Ok(None),
                }
            },
            async {
                match &settings.reranker_model {
                    Some(model) => self
                        .embedder
                        .encode_late_interaction(&texts, model)
                        .await
                        .map(Some),
                    None => Ok(None),
                }
            },
        );
        let dense = dense_res?
            .into_iter()
            .next()
            .ok_or_else(|| PassageError::Embedding {
                model: settings.dense_model.clone(),
                message: "empty dense response for query".into(),
            })?;
        let sparse = sparse_res?.and_then(|mut v| v.pop());
        let rerank_matrix = rerank_res?.and_then(|mut v| v.pop());

        // Adapter transform; any failure falls back to the raw vector.
        let search_vector = match self
            .adapters
            .transform(&request.collection_id, &dense)
            .await
        {
            Ok(Some(transformed)) => transformed,
            Ok(None) => dense.clone(),
            Err(e) => {
                warn!(collection = %request.collection_id, error = %e, "adapter transform failed");
                dense.clone()
            }
        };

        let mut filter = PointFilter::owner(&owner);
        if let Some(resource_id) = &request.resource_id {
            filter = filter.with_resource(resource_id);
        }

        let mut results = match &sparse {
            Some(sparse_vector) => {
                self.index
                    .hybrid_query(
                        &request.collection_id,
                        &search_vector,
                        sparse_vector,
                        CANDIDATE_POOL,
                        &filter,
                    )
                    .await?
            }
            None => {
                self.index
                    .dense_query(&request.collection_id, &search_vector, CANDIDATE_POOL, &filter)
                    .await?
            }
        };

        if let Some(matrix) = &rerank_matrix {
            let pool = if request.use_feedback {
                request.top_k.max(RERANK_POOL)
            } else {
                request.top_k
            };
            let candidate_ids: Vec<String> = results.iter().map(|r| r.id.clone()).collect();
            results = self
                .index
                .rerank(&request.collection_id, matrix, &candidate_ids, pool)
                .await?;
        }

        if request.use_feedback {
            if let Err(e) = self
                .fuse_feedback(&request.collection_id, &owner, &dense, &mut results)
                .await
            {
                // Fusion is best-effort; degraded ranking beats a failed
                // search.
                warn!(collection = %request.collection_id, error = %e, "feedback fusion failed");
            }
        }

        results.truncate(request.top_k);
        if let Some(min_score) = request.min_score {
            results.retain(|r| r.score >= min_score);
        }

        let mut hits = Vec::with_capacity(results.len());
        for point in results {
            let feedback = if request.is_review {
                Some(
                    create_review_link(
                        self.cache.as_ref(),
                        &request.query,
                        &request.collection_id,
                        &owner,
                        &point,
                    )
                    .await,
                )
            } else {
                None
            };
            hits.push(SearchHit {
                id: point.id,
                score: point.score,
                payload: point.payload,
                feedback,
            });
        }

        if request.analytics {
            let event = AnalyticsEvent {
                id: Uuid::new_v4().to_string(),
                collection_id: request.collection_id.clone(),
                owner_id: owner,
                query: request.query.clone(),
                rt_ms: started.elapsed().as_millis() as u64,
                ts: Utc::now(),
            };
            let broker = self.broker.clone();
            // Fire and forget: analytics must never delay or fail a search.
            tokio::spawn(async move {
                if let Ok(payload) = serde_json::to_value(&event) {
                    let _ = broker.publish(ANALYTICS_QUEUE, payload).await;
                }
            });
        }

        Ok(SearchResponse { result: hits })
    }

    /// Boost current results that similar past queries upvoted:
    /// `score += ln(count) × similarity` per recorded hit.
    async fn fuse_feedback(
        &self,
        collection_id: &str,
        owner: &str,
        query_vector: &[f32],
        results: &mut Vec<ScoredPoint>,
    ) -> Result<()> {
        let feedback_index = feedback_collection(collection_id);
        if !self.index.collection_exists(&feedback_index).await? {
            return Ok(());
        }
        let prior_queries = self
            .index
            .dense_query(
                &feedback_index,
                query_vector,
                FEEDBACK_LOOKUP,
                &PointFilter::owner(owner),
            )
            .await?;

        let mut boosted = 0usize;
        for prior in prior_queries
            .iter()
            .filter(|p| p.score > FEEDBACK_SIMILARITY)
        {
            let Some(doc) =
                get_typed::<FeedbackDoc>(self.docstore.as_ref(), ns::FEEDBACK, &prior.id).await?
            else {
                continue;
            };
            for (chunk_id, hit) in &doc.hits {
                if hit.count < 1 {
                    continue;
                }
                if let Some(result) = results.iter_mut().find(|r| &r.id == chunk_id) {
                    result.score += (hit.count as f32).ln() * prior.score;
                    boosted += 1;
                }
            }
        }
        if boosted > 0 {
            results.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            debug!(collection = collection_id, boosted, "applied feedback fusion");
        }
        Ok(())
    }
}

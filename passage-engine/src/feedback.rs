//! The feedback loop: votes → per-query hit counts in vector space →
//! adapter training.
//!
//! Votes arrive over HTTP or via 24 h review links, ride the
//! `search-feedback` queue, and land here. Each vote either merges into
//! the nearest existing feedback record (dense similarity > 0.9) or
//! creates a new content-addressed one, and upvotes additionally train the
//! collection's adapter toward the upvoted chunk.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use passage_adapter::AdapterService;
use passage_core::{
    feedback_address, FeedbackAction, FeedbackDoc, FeedbackEvent, FeedbackLink, PassageError,
    Result, EVENT_VERSION, FEEDBACK_QUEUE,
};
use passage_embed::Embedder;
use passage_index::{
    feedback_collection, PointFilter, ScoredPoint, VectorIndex, VectorPoint,
};

use crate::broker::Broker;
use crate::cache::{TtlCache, REVIEW_LINK_TTL};
use crate::collections::CollectionService;
use crate::docstore::{get_typed, ns, put_typed, DocStore};

/// Similarity above which a new vote merges into an existing feedback
/// record instead of creating its own.
const MERGE_SIMILARITY: f32 = 0.9;

/// Vote request from the HTTP API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub collection_id: String,
    pub query: String,
    pub chunk_id: String,
    pub resource_id: String,
    pub action: FeedbackAction,
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Acknowledgement returned to voters.
#[derive(Debug, Clone, Serialize)]
pub struct VoteAck {
    pub success: bool,
    pub message: String,
}

/// Review links attached to search hits in review mode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLinks {
    pub reference_id: String,
    pub upvote: String,
    pub downvote: String,
}

fn link_key(reference_id: &str) -> String {
    format!("feedback-link:{reference_id}")
}

/// Stash a review link for a search hit; the link expires with the cache
/// entry.
pub async fn create_review_link(
    cache: &dyn TtlCache,
    query: &str,
    collection_id: &str,
    owner_id: &str,
    point: &ScoredPoint,
) -> ReviewLinks {
    let reference_id = Uuid::new_v4().to_string();
    let resource_id = point
        .payload
        .get("resourceId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let link = FeedbackLink {
        query: query.to_string(),
        collection_id: collection_id.to_string(),
        chunk_id: point.id.clone(),
        resource_id,
        owner_id: owner_id.to_string(),
    };
    if let Ok(value) = serde_json::to_value(&link) {
        cache.set(&link_key(&reference_id), value, REVIEW_LINK_TTL).await;
    }
    ReviewLinks {
        upvote: format!("/feedback/vote/{reference_id}/upvote"),
        downvote: format!("/feedback/vote/{reference_id}/downvote"),
        reference_id,
    }
}

pub struct FeedbackService {
    collections: Arc<CollectionService>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    adapters: Arc<AdapterService>,
    docstore: Arc<dyn DocStore>,
    cache: Arc<dyn TtlCache>,
    broker: Arc<dyn Broker>,
}

impl FeedbackService {
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

    /// Accept a vote from the API: enqueue it and ack immediately.
    pub async fn vote(&self, request: VoteRequest) -> Result<VoteAck> {
        if request.query.trim().is_empty() {
            return Err(PassageError::Validation("query is required".into()));
        }
        let event = FeedbackEvent {
            version: EVENT_VERSION,
            query: request.query,
            chunk_id: request.chunk_id,
            resource_id: request.resource_id,
            action: request.action,
            collection_id: request.collection_id,
            owner_id: request.owner_id.unwrap_or_else(|| "public".into()),
        };
        self.broker
            .publish(FEEDBACK_QUEUE, serde_json::to_value(&event)?)
            .await?;
        Ok(VoteAck {
            success: true,
            message: "feedback queued".into(),
        })
    }

    /// Resolve a review link and enqueue the vote it encodes. 404s once
    /// the link has expired.
    pub async fn vote_by_reference(
        &self,
        reference_id: &str,
        action: FeedbackAction,
    ) -> Result<VoteAck> {
        let Some(value) = self.cache.get(&link_key(reference_id)).await else {
            return Err(PassageError::NotFound {
                kind: "feedback link",
                id: reference_id.to_string(),
            });
        };
        let link: FeedbackLink = serde_json::from_value(value)?;
        self.vote(VoteRequest {
            collection_id: link.collection_id,
            query: link.query,
            chunk_id: link.chunk_id,
            resource_id: link.resource_id,
            action,
            owner_id: Some(link.owner_id),
        })
        .await
    }

    /// Consume one feedback event end to end.
    pub async fn process_event(&self, event: FeedbackEvent) -> Result<()> {
        let settings = self.collections.settings(&event.collection_id).await?;

        let texts = vec![event.query.clone()];
        let dense = self
            .embedder
            .encode_dense(&texts, &settings.dense_model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PassageError::Embedding {
                model: settings.dense_model.clone(),
                message: "empty dense response for feedback query".into(),
            })?;
        let sparse = match &settings.sparse_model {
            Some(model) => self
                .embedder
                .encode_sparse(&texts, model)
                .await?
                .into_iter()
                .next(),
            None => None,
        };

        // Nearest prior feedback query from the same owner.
        let feedback_index = feedback_collection(&event.collection_id);
        let nearest = if self.index.collection_exists(&feedback_index).await? {
            self.index
                .dense_query(
                    &feedback_index,
                    &dense,
                    1,
                    &PointFilter::owner(&event.owner_id),
                )
                .await?
                .into_iter()
                .next()
        } else {
            None
        };

        let feedback_id = match nearest {
            Some(prior) if prior.score > MERGE_SIMILARITY => {
                debug!(
                    feedback = %prior.id,
                    similarity = prior.score,
                    "merging vote into existing feedback record"
                );
                prior.id
            }
            _ => {
                let id = feedback_address(&event.collection_id, &event.owner_id, &event.query);
                let mut payload = Map::new();
                payload.insert("ownerId".into(), Value::String(event.owner_id.clone()));
                payload.insert(
                    "collectionId".into(),
                    Value::String(event.collection_id.clone()),
                );
                payload.insert("query".into(), Value::String(event.query.clone()));
                self.index
                    .upsert(
                        &feedback_index,
                        vec![VectorPoint {
                            id: id.clone(),
                            dense: dense.clone(),
                            sparse,
                            rerank: None,
                            payload,
                        }],
                    )
                    .await?;
                id
            }
        };

        let mut doc = get_typed::<FeedbackDoc>(self.docstore.as_ref(), ns::FEEDBACK, &feedback_id)
            .await?
            .unwrap_or_else(|| FeedbackDoc {
                id: feedback_id.clone(),
                query: event.query.clone(),
                collection_id: event.collection_id.clone(),
                owner_id: event.owner_id.clone(),
                hits: Default::default(),
            });
        doc.apply(&event.chunk_id, &event.resource_id, event.action);
        put_typed(self.docstore.as_ref(), ns::FEEDBACK, &feedback_id, &doc).await?;
        info!(
            feedback = %feedback_id,
            chunk = %event.chunk_id,
            action = ?event.action,
            "recorded vote"
        );

        // Upvotes also pull the adapter toward the chunk. Training errors
        // degrade personalization, not feedback processing.
        if event.action == FeedbackAction::Upvote {
            match self
                .index
                .retrieve(&event.collection_id, &[event.chunk_id.clone()])
                .await
            {
                Ok(points) => {
                    if let Some(point) = points.first() {
                        if let Err(e) = self
                            .adapters
                            .train_with_feedback(&event.collection_id, &dense, &point.dense)
                            .await
                        {
                            warn!(collection = %event.collection_id, error = %e, "adapter training failed");
                        }
                    } else {
                        warn!(chunk = %event.chunk_id, "upvoted chunk not in vector index");
                    }
                }
                Err(e) => {
                    warn!(collection = %event.collection_id, error = %e, "chunk vector fetch failed");
                }
            }
        }
        Ok(())
    }
}

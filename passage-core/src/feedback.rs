//! Feedback records: per-query upvote/downvote aggregates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Direction of a feedback vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Upvote,
    Downvote,
}

impl FeedbackAction {
    /// Signed increment applied to a chunk's hit count.
    pub fn delta(self) -> i64 {
        match self {
            FeedbackAction::Upvote => 1,
            FeedbackAction::Downvote => -1,
        }
    }
}

/// Per-chunk tally inside a [`FeedbackDoc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackHit {
    pub resource_id: String,
    pub count: i64,
}

/// A content-addressed record aggregating votes for a representative query.
///
/// `hits` is persisted as a JSON object keyed by chunk id:
/// `{"<chunkId>": {"resourceId": "...", "count": N}}`. A parallel point in
/// the `feedback_<collectionId>` vector collection carries the query
/// embedding so similar future queries can find this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDoc {
    pub id: String,
    pub query: String,
    pub collection_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub hits: HashMap<String, FeedbackHit>,
}

impl FeedbackDoc {
    /// Apply one vote for `chunk_id`, creating the row when absent.
    pub fn apply(&mut self, chunk_id: &str, resource_id: &str, action: FeedbackAction) {
        let hit = self
            .hits
            .entry(chunk_id.to_string())
            .or_insert_with(|| FeedbackHit {
                resource_id: resource_id.to_string(),
                count: 0,
            });
        hit.count += action.delta();
    }
}

/// Review-link payload stored behind an opaque reference id with a 24 h TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackLink {
    pub query: String,
    pub collection_id: String,
    pub chunk_id: String,
    pub resource_id: String,
    pub owner_id: String,
}

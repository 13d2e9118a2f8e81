//! Queue event schemas and queue names.
//!
//! Every event is JSON with a `version` field and an `event` discriminator.
//! Each queue has a `<name>_FAILED` dead-letter sibling; consumers always
//! ack the original message and publish failures there instead of
//! re-queueing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::feedback::FeedbackAction;
use crate::resource::StatusInfo;

/// Schema version stamped on outgoing events.
pub const EVENT_VERSION: u32 = 1;

/// Ingest events (load / chunk / update / delete).
pub const INGEST_QUEUE: &str = "rag";
/// Persist fan-out exchange; messages are mirrored to the sync queues.
pub const CHUNK_EXCHANGE: &str = "chunk_exchange";
/// Document-store persist queue.
pub const DOCSTORE_SYNC_QUEUE: &str = "mongo-sync";
/// Vector-store persist queue, region A.
pub const VECTOR_SYNC_QUEUE_A: &str = "qdrant-usa-sync";
/// Vector-store persist queue, region B.
pub const VECTOR_SYNC_QUEUE_B: &str = "qdrant-india-sync";
/// Feedback vote events.
pub const FEEDBACK_QUEUE: &str = "search-feedback";
/// Query analytics events.
pub const ANALYTICS_QUEUE: &str = "analytics";

/// Dead-letter sibling of a queue.
pub fn failed_queue(queue: &str) -> String {
    format!("{queue}_FAILED")
}

/// Stage discriminator for ingest events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestAction {
    Load,
    Chunk,
    Update,
    Delete,
}

/// Payload of an ingest event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestData {
    pub resource_id: String,
    pub collection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One message on the ingest queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEvent {
    pub version: u32,
    pub event: IngestAction,
    pub data: IngestData,
}

impl IngestEvent {
    pub fn new(event: IngestAction, data: IngestData) -> Self {
        Self {
            version: EVENT_VERSION,
            event,
            data,
        }
    }
}

/// Persist-stage discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistAction {
    Upsert,
    Delete,
}

/// Payload of a persist event. For `Delete`, `chunks` is empty and the
/// consumers purge by `resource_id` filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistData {
    pub collection_id: String,
    pub owner_id: String,
    pub resource_id: String,
    pub keep_duplicate: bool,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

/// One message on the persist fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistEvent {
    pub version: u32,
    pub event: PersistAction,
    pub data: PersistData,
}

impl PersistEvent {
    pub fn new(event: PersistAction, data: PersistData) -> Self {
        Self {
            version: EVENT_VERSION,
            event,
            data,
        }
    }
}

/// One vote on the feedback queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    pub version: u32,
    pub query: String,
    pub chunk_id: String,
    pub resource_id: String,
    pub action: FeedbackAction,
    pub collection_id: String,
    pub owner_id: String,
}

/// One record on the analytics queue, emitted fire-and-forget per search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: String,
    pub collection_id: String,
    pub owner_id: String,
    pub query: String,
    pub rt_ms: u64,
    pub ts: DateTime<Utc>,
}

/// Status notification published on the realtime `resource` channel after
/// each ingestion stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeMessage {
    pub resource_id: String,
    pub collection_id: String,
    #[serde(flatten)]
    pub status: StatusInfo,
}

//! # passage-core
//!
//! Shared data model for the passage retrieval backend: collections,
//! resources, chunks, feedback records, evaluation records, the queue event
//! schemas, content-addressed id derivation, and the crate-spanning error
//! type.
//!
//! Everything here is plain data — the behavior lives in the sibling crates
//! (`passage-embed`, `passage-chunk`, `passage-index`, `passage-adapter`,
//! `passage-engine`).

pub mod chunk;
pub mod collection;
pub mod config;
pub mod error;
pub mod event;
pub mod eval;
pub mod feedback;
pub mod ids;
pub mod resource;

pub use chunk::{Chunk, SparseVector};
pub use collection::{ChunkStrategy, Collection, CollectionSettings, UpdateCollection};
pub use config::AppConfig;
pub use error::{PassageError, Result};
pub use event::{
    failed_queue, AnalyticsEvent, FeedbackEvent, IngestAction, IngestData, IngestEvent,
    PersistAction, PersistData, PersistEvent, RealtimeMessage, ANALYTICS_QUEUE, CHUNK_EXCHANGE,
    DOCSTORE_SYNC_QUEUE, EVENT_VERSION, FEEDBACK_QUEUE, INGEST_QUEUE, VECTOR_SYNC_QUEUE_A,
    VECTOR_SYNC_QUEUE_B,
};
pub use eval::{EvalCaseResult, EvalReport, EvalRun, EvalTestCase};
pub use feedback::{FeedbackAction, FeedbackDoc, FeedbackHit, FeedbackLink};
pub use ids::{chunk_address, content_address, content_hash, feedback_address};
pub use resource::{ChunkOverrides, Resource, ResourceStatus, StatusInfo};

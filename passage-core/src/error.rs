//! Error types shared across the passage workspace.

use thiserror::Error;

/// Errors that can occur anywhere in the ingestion and retrieval pipeline.
#[derive(Debug, Error)]
pub enum PassageError {
    /// A request carried missing or invalid fields, an unsupported model
    /// name, or a custom chunking URL that failed its health probe.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A collection, resource, chunk, or eval case was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of record that was looked up.
        kind: &'static str,
        /// The id that failed to resolve.
        id: String,
    },

    /// The embedding model server rejected a request or was unreachable
    /// after bounded retries.
    #[error("Embedding error ({model}): {message}")]
    Embedding {
        /// The model the encode call was routed to.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the vector index backend.
    #[error("Vector index error ({backend}): {message}")]
    VectorIndex {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the document store.
    #[error("Document store error: {0}")]
    DocStore(String),

    /// An error publishing to or consuming from the message broker.
    #[error("Broker error: {0}")]
    Broker(String),

    /// An error while splitting a document into chunks.
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// An error fetching source content for a resource.
    #[error("Loader error: {0}")]
    Loader(String),

    /// An adapter input or training target did not match the collection's
    /// embedding dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the adapter was initialized with.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// An adapter training or persistence failure.
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// A JSON (de)serialization failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// A filesystem failure (adapter persistence).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PassageError {
    /// Stable machine-readable code for the API error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            PassageError::Validation(_) => "validation",
            PassageError::NotFound { .. } => "not_found",
            PassageError::Embedding { .. } => "embedding_unavailable",
            PassageError::VectorIndex { .. } => "vector_index_unavailable",
            PassageError::DocStore(_) => "doc_store_unavailable",
            PassageError::Broker(_) => "broker_unavailable",
            PassageError::Chunking(_) => "chunking_failed",
            PassageError::Loader(_) => "loader_failed",
            PassageError::DimensionMismatch { .. } => "dimension_mismatch",
            PassageError::Adapter(_) => "adapter_failed",
            PassageError::Pipeline(_) => "pipeline_failed",
            PassageError::Serialization(_) => "serialization_failed",
            PassageError::Io(_) => "io_failed",
        }
    }
}

/// A convenience result type for passage operations.
pub type Result<T> = std::result::Result<T, PassageError>;

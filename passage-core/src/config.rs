//! Environment-driven configuration for the service binary.

use std::path::PathBuf;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Base URL of the embedding model server.
    pub embedding_server_url: String,
    /// Qdrant gRPC endpoint; when unset the in-memory index is used.
    pub qdrant_url: Option<String>,
    /// Optional Qdrant API key.
    pub qdrant_api_key: Option<String>,
    /// Persist adapters in the document store instead of files.
    pub adapter_use_docstore: bool,
    /// Directory for file-backed adapter records.
    pub adapter_storage_path: PathBuf,
    /// TTL for cached collection settings, in seconds.
    pub settings_cache_ttl_secs: u64,
    /// Interval between RAG sync sweeps, in seconds. 0 disables the job.
    pub sync_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8190,
            embedding_server_url: "http://localhost:8000".to_string(),
            qdrant_url: None,
            qdrant_api_key: None,
            adapter_use_docstore: false,
            adapter_storage_path: PathBuf::from("./adapters"),
            settings_cache_ttl_secs: 60,
            sync_interval_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Build configuration from the environment, falling back to defaults
    /// field by field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            embedding_server_url: std::env::var("EMBEDDING_SERVER_URL")
                .unwrap_or(defaults.embedding_server_url),
            qdrant_url: std::env::var("QDRANT_URL").ok().filter(|s| !s.is_empty()),
            qdrant_api_key: std::env::var("QDRANT_API_KEY").ok().filter(|s| !s.is_empty()),
            adapter_use_docstore: env_parse("ADAPTER_USE_DOCSTORE")
                .unwrap_or(defaults.adapter_use_docstore),
            adapter_storage_path: std::env::var("ADAPTER_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.adapter_storage_path),
            settings_cache_ttl_secs: env_parse("SETTINGS_CACHE_TTL_SECS")
                .unwrap_or(defaults.settings_cache_ttl_secs),
            sync_interval_secs: env_parse("RAG_SYNC_INTERVAL_SECS")
                .unwrap_or(defaults.sync_interval_secs),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

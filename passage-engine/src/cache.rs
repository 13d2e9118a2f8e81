//! Short-TTL key-value cache: collection settings and feedback review
//! links.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// TTL for cached feedback review links.
pub const REVIEW_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Get/set-with-ttl/del, the full surface the services need. Invalidation
/// is by `del(key)` on update.
#[async_trait]
pub trait TtlCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value, ttl: Duration);
    async fn del(&self, key: &str);
}

/// In-memory [`TtlCache`] with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryTtlCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl MemoryTtlCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TtlCache for MemoryTtlCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, deadline)) if *deadline > now => return Some(value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it on the way out.
        self.entries.write().await.remove(key);
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    async fn del(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn entries_expire() {
        let cache = MemoryTtlCache::new();
        cache
            .set("k", json!(1), Duration::from_millis(20))
            .await;
        assert_eq!(cache.get("k").await, Some(json!(1)));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn del_invalidates() {
        let cache = MemoryTtlCache::new();
        cache.set("k", json!("v"), Duration::from_secs(60)).await;
        cache.del("k").await;
        assert_eq!(cache.get("k").await, None);
    }
}

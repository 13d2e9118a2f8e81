//! Content-addressed id derivation.
//!
//! Chunk and feedback ids are derived from their content so that
//! re-ingesting the same text under the same ownership overwrites in place
//! instead of accumulating duplicates. The derivation is
//! `md5(collectionId ":" ownerId ":" content)` rendered in the 8-4-4-4-12
//! UUID layout — the exact format matters for cross-process idempotence,
//! so any change here breaks existing indexes.

use md5::{Digest, Md5};

/// Derive a deterministic UUID-shaped id from `(collectionId, ownerId, content)`.
pub fn content_address(collection_id: &str, owner_id: &str, content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(collection_id.as_bytes());
    hasher.update(b":");
    hasher.update(owner_id.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Id for a chunk: the addressed content is the display text concatenated
/// with the embedded text (when they differ).
pub fn chunk_address(
    collection_id: &str,
    owner_id: &str,
    data: &str,
    vector_source: Option<&str>,
) -> String {
    match vector_source {
        Some(vs) => content_address(collection_id, owner_id, &format!("{data}{vs}")),
        None => content_address(collection_id, owner_id, data),
    }
}

/// Id for a feedback record, addressed by the representative query text.
pub fn feedback_address(collection_id: &str, owner_id: &str, query: &str) -> String {
    content_address(collection_id, owner_id, query)
}

/// Plain md5 hex of a document body, used to skip re-chunking when a
/// re-fetched source has not changed.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_uuid_shaped() {
        let id = content_address("col", "public", "Cats purr.");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 4);
        assert_eq!(parts[2].len(), 4);
        assert_eq!(parts[3].len(), 4);
        assert_eq!(parts[4].len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    #[test]
    fn address_is_deterministic() {
        let a = content_address("col", "public", "same text");
        let b = content_address("col", "public", "same text");
        assert_eq!(a, b);
    }

    #[test]
    fn address_separates_ownership() {
        let a = content_address("col", "alice", "same text");
        let b = content_address("col", "bob", "same text");
        assert_ne!(a, b);
    }

    #[test]
    fn vector_source_participates_in_chunk_address() {
        let plain = chunk_address("col", "public", "display", None);
        let sourced = chunk_address("col", "public", "display", Some("embedded"));
        assert_ne!(plain, sourced);
        // Matches concatenation of data + vectorSource.
        assert_eq!(
            sourced,
            content_address("col", "public", "displayembedded")
        );
    }

    #[test]
    fn known_digest_layout() {
        // md5("a:b:c") = 02cc8f08398a4f3113b554e8105ebe4c
        let id = content_address("a", "b", "c");
        assert_eq!(id, "02cc8f08-398a-4f31-13b5-54e8105ebe4c");
    }
}

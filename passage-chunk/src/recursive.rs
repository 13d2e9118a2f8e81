//! Hierarchical fixed-size chunking: paragraphs, then sentences, then words.

use async_trait::async_trait;

use passage_core::Result;

use crate::{ChunkPiece, Chunker};

/// Splits text hierarchically with configurable size and overlap.
///
/// Splits by paragraph separators first; segments that still exceed
/// `chunk_size` are split at sentence boundaries, then at word boundaries,
/// then by raw size as a last resort. All boundaries respect UTF-8.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

const SEPARATORS: &[&str] = &["\n\n", ". ", "! ", "? ", " "];

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Split into plain strings; the trait impl wraps them into pieces.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        split_and_merge(text, self.chunk_size, self.chunk_overlap, SEPARATORS)
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[async_trait]
impl Chunker for RecursiveChunker {
    async fn chunk(&self, text: &str) -> Result<Vec<ChunkPiece>> {
        Ok(self.split(text).into_iter().map(ChunkPiece::text).collect())
    }
}

/// Split at a separator level, merging segments back up to `chunk_size`;
/// oversized segments recurse into the next separator level.
fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if text.len() <= chunk_size || separators.is_empty() {
        return split_by_size(text, chunk_size, chunk_overlap);
    }

    let separator = separators[0];
    let remaining = &separators[1..];
    let segments = split_keeping_separator(text, separator);

    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in segments {
        if current.is_empty() {
            current = segment.to_string();
        } else if current.len() + segment.len() <= chunk_size {
            current.push_str(segment);
        } else {
            flush(&mut chunks, current, chunk_size, chunk_overlap, remaining);
            current = segment.to_string();
        }
    }
    if !current.is_empty() {
        flush(&mut chunks, current, chunk_size, chunk_overlap, remaining);
    }
    chunks
}

fn flush(
    chunks: &mut Vec<String>,
    current: String,
    chunk_size: usize,
    chunk_overlap: usize,
    remaining: &[&str],
) {
    if current.len() > chunk_size {
        chunks.extend(split_and_merge(
            &current,
            chunk_size,
            chunk_overlap,
            remaining,
        ));
    } else {
        chunks.push(current);
    }
}

/// Split at a separator, keeping the separator attached to the preceding
/// segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        result.push(&text[start..]);
    }
    result
}

/// Raw size-based splitting with overlap, cutting only at char boundaries.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        if end <= start {
            break;
        }
        chunks.push(text[start..end].to_string());
        if end == text.len() {
            break;
        }
        start = ceil_char_boundary(text, start + step);
    }
    chunks
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx.min(text.len())
}

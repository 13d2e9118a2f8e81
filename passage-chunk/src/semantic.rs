//! Breakpoint-based semantic chunking.
//!
//! Sentences are embedded individually; the similarity between consecutive
//! sentence embeddings forms a sequence, and the 20th percentile of that
//! sequence — clamped into `[0.40, 0.90]` — becomes the breakpoint
//! threshold. Low-similarity junctions become chunk boundaries, subject to
//! the min/max size rules.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use passage_core::Result;
use passage_embed::Embedder;

use crate::recursive::RecursiveChunker;
use crate::{ChunkPiece, Chunker};

/// Inputs above this size downgrade to recursive chunking: embedding every
/// sentence of a large document costs more latency than the boundary
/// quality is worth.
pub const SEMANTIC_MAX_INPUT: usize = 10_000;

/// Percentile of the similarity sequence used as the breakpoint threshold.
const BREAKPOINT_PERCENTILE: f64 = 0.20;

/// Threshold clamp: above 0.90 even the weakest bond is strong (don't
/// split); below 0.40 the text is heterogeneous enough that those splits
/// should still happen.
const TAU_MIN: f32 = 0.40;
const TAU_MAX: f32 = 0.90;

/// Default minimum chunk size derived from a collection's `chunk_size`.
pub fn min_chunk_size_for(chunk_size: usize) -> usize {
    (chunk_size / 4).max(1)
}

/// Semantic chunker over sentence embeddings.
pub struct SemanticChunker {
    min_chunk_size: usize,
    max_chunk_size: usize,
    dense_model: String,
    embedder: Arc<dyn Embedder>,
    sentence_re: Regex,
}

impl SemanticChunker {
    pub fn new(
        min_chunk_size: usize,
        max_chunk_size: usize,
        dense_model: String,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            min_chunk_size,
            max_chunk_size: max_chunk_size.max(1),
            dense_model,
            embedder,
            // Latin, CJK, and Arabic sentence stops.
            sentence_re: Regex::new(r"[^.!?。！？؟]+[.!?。！？؟]+\s*")
                .expect("sentence regex is valid"),
        }
    }

    /// Split into sentences; fall back to newline groups when the text has
    /// no sentence punctuation at all.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences: Vec<String> = self
            .sentence_re
            .find_iter(text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if sentences.is_empty() {
            sentences = text
                .split('\n')
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect();
        }

        let segment_budget = 200.min(self.max_chunk_size / 4).max(1);
        sentences
            .into_iter()
            .flat_map(|sentence| {
                if sentence.len() > self.max_chunk_size {
                    split_by_whitespace(&sentence, segment_budget)
                } else {
                    vec![sentence]
                }
            })
            .collect()
    }

    /// Walk sentences, flushing at breakpoints and size limits.
    fn group(&self, sentences: &[String], breakpoints: &[bool]) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for (i, sentence) in sentences.iter().enumerate() {
            let added_len = if current.is_empty() {
                sentence.len()
            } else {
                current.len() + 1 + sentence.len()
            };
            if !current.is_empty() && added_len > self.max_chunk_size {
                chunks.push(std::mem::take(&mut current));
            }
            if current.is_empty() {
                current = sentence.clone();
            } else {
                current.push(' ');
                current.push_str(sentence);
            }
            // Breakpoint after sentence i flushes only once the chunk has
            // grown past the minimum.
            let at_breakpoint = i < breakpoints.len() && breakpoints[i];
            if at_breakpoint && current.len() >= self.min_chunk_size {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        // A short tail merges backwards when the pair still fits.
        if chunks.len() >= 2 {
            let last = chunks[chunks.len() - 1].clone();
            let prev = chunks[chunks.len() - 2].clone();
            if last.len() < self.min_chunk_size
                && prev.len() + 1 + last.len() <= self.max_chunk_size
            {
                chunks.pop();
                let merged_idx = chunks.len() - 1;
                chunks[merged_idx] = format!("{prev} {last}");
            }
        }
        chunks
    }
}

#[async_trait]
impl Chunker for SemanticChunker {
    async fn chunk(&self, text: &str) -> Result<Vec<ChunkPiece>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        if text.len() > SEMANTIC_MAX_INPUT {
            debug!(
                len = text.len(),
                "input too large for semantic chunking, using recursive"
            );
            let fallback = RecursiveChunker::new(self.max_chunk_size, self.min_chunk_size / 2);
            return fallback.chunk(text).await;
        }

        let sentences = self.split_sentences(text);
        if sentences.len() <= 1 {
            return Ok(sentences.into_iter().map(ChunkPiece::text).collect());
        }

        let embeddings = self
            .embedder
            .encode_dense(&sentences, &self.dense_model)
            .await?;

        let similarities: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| cosine(&pair[0], &pair[1]))
            .collect();
        let tau = breakpoint_threshold(&similarities);
        let breakpoints: Vec<bool> = similarities.iter().map(|s| *s <= tau).collect();

        debug!(
            sentences = sentences.len(),
            tau,
            breakpoints = breakpoints.iter().filter(|b| **b).count(),
            "semantic grouping"
        );

        Ok(self
            .group(&sentences, &breakpoints)
            .into_iter()
            .map(ChunkPiece::text)
            .collect())
    }
}

/// The similarity score at the 20th percentile, clamped into
/// `[TAU_MIN, TAU_MAX]`.
fn breakpoint_threshold(similarities: &[f32]) -> f32 {
    if similarities.is_empty() {
        return TAU_MIN;
    }
    let mut sorted = similarities.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (((sorted.len() - 1) as f64) * BREAKPOINT_PERCENTILE).floor() as usize;
    sorted[idx].clamp(TAU_MIN, TAU_MAX)
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Split an oversized sentence by whitespace into segments no larger than
/// `budget` bytes; single words past the budget are hard-split at char
/// boundaries.
fn split_by_whitespace(sentence: &str, budget: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        if word.len() > budget {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            segments.extend(hard_split(word, budget));
            continue;
        }
        let added = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if added > budget && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        if current.is_empty() {
            current = word.to_string();
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn hard_split(word: &str, budget: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    while start < word.len() {
        let mut end = (start + budget).min(word.len());
        while end > start && !word.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            break;
        }
        parts.push(word[start..end].to_string());
        start = end;
    }
    parts
}

//! In-process vector index implementing the full capability surface.
//!
//! Backs tests and single-node deployments. Collections live in a
//! `RwLock<HashMap>`; dense scoring is cosine, sparse scoring is dot
//! product, rerank scoring is max-sim, and hybrid queries fuse the dense
//! and sparse rankings with RRF exactly like the gRPC backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use passage_core::{PassageError, Result, SparseVector};

use crate::rrf::{rrf_fuse, RRF_K};
use crate::store::VectorIndex;
use crate::types::{CollectionSpec, PointFilter, ScoredPoint, VectorPoint};

#[derive(Debug, Default)]
struct MemoryCollection {
    spec: Option<CollectionSpec>,
    points: HashMap<String, VectorPoint>,
}

/// A [`VectorIndex`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(name: &str) -> PassageError {
        PassageError::VectorIndex {
            backend: "memory".into(),
            message: format!("collection '{name}' does not exist"),
        }
    }
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

/// ColBERT-style max-sim: for each query token, the best cosine against any
/// document token, summed over query tokens.
fn max_sim(query: &[Vec<f32>], document: &[Vec<f32>]) -> f32 {
    query
        .iter()
        .map(|q_token| {
            document
                .iter()
                .map(|d_token| cosine(q_token, d_token))
                .fold(f32::MIN, f32::max)
        })
        .filter(|s| s.is_finite())
        .sum()
}

/// Rank matching points by a score function, best first.
fn ranked_ids<F>(
    points: &HashMap<String, VectorPoint>,
    filter: &PointFilter,
    limit: usize,
    score: F,
) -> Vec<(String, f32)>
where
    F: Fn(&VectorPoint) -> Option<f32>,
{
    let mut scored: Vec<(String, f32)> = points
        .values()
        .filter(|p| filter.matches(&p.payload))
        .filter_map(|p| score(p).map(|s| (p.id.clone(), s)))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(limit);
    scored
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(name.to_string()).or_default();
        if entry.spec.is_none() {
            entry.spec = Some(spec.clone());
            debug!(collection = name, dim = spec.dense_dim, "created collection");
        }
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let mut collections = self.collections.write().await;
        let entry = collections.entry(name.to_string()).or_default();
        if entry.spec.is_none() {
            entry.spec = Some(points[0].spec());
        }
        let expected_dim = entry.spec.as_ref().map(|s| s.dense_dim).unwrap_or(0);
        for point in points {
            if point.dense.len() != expected_dim {
                return Err(PassageError::VectorIndex {
                    backend: "memory".into(),
                    message: format!(
                        "dense vector of {} dims upserted into {expected_dim}-dim collection '{name}'",
                        point.dense.len()
                    ),
                });
            }
            entry.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn dense_query(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let entry = collections.get(name).ok_or_else(|| Self::missing(name))?;
        Ok(
            ranked_ids(&entry.points, filter, limit, |p| {
                Some(cosine(&p.dense, vector))
            })
            .into_iter()
            .map(|(id, score)| ScoredPoint {
                payload: entry.points[&id].payload.clone(),
                id,
                score,
            })
            .collect(),
        )
    }

    async fn hybrid_query(
        &self,
        name: &str,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let entry = collections.get(name).ok_or_else(|| Self::missing(name))?;
        let prefetch = limit * 2;

        let dense_list: Vec<String> =
            ranked_ids(&entry.points, filter, prefetch, |p| {
                Some(cosine(&p.dense, dense))
            })
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let sparse_list: Vec<String> = ranked_ids(&entry.points, filter, prefetch, |p| {
            p.sparse.as_ref().map(|sv| sv.dot(sparse))
        })
        .into_iter()
        .map(|(id, _)| id)
        .collect();

        let fused = rrf_fuse(&[dense_list, sparse_list], RRF_K);
        Ok(fused
            .into_iter()
            .take(limit)
            .map(|(id, score)| ScoredPoint {
                payload: entry.points[&id].payload.clone(),
                id,
                score,
            })
            .collect())
    }

    async fn rerank(
        &self,
        name: &str,
        query_matrix: &[Vec<f32>],
        candidate_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let entry = collections.get(name).ok_or_else(|| Self::missing(name))?;
        let candidates: HashSet<&String> = candidate_ids.iter().collect();

        let mut scored: Vec<ScoredPoint> = entry
            .points
            .values()
            .filter(|p| candidates.contains(&p.id))
            .filter_map(|p| {
                p.rerank.as_ref().map(|matrix| ScoredPoint {
                    id: p.id.clone(),
                    score: max_sim(query_matrix, matrix),
                    payload: p.payload.clone(),
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete_by_filter(&self, name: &str, filter: &PointFilter) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(entry) = collections.get_mut(name) {
            let before = entry.points.len();
            entry.points.retain(|_, p| !filter.matches(&p.payload));
            debug!(
                collection = name,
                deleted = before - entry.points.len(),
                "deleted by filter"
            );
        }
        Ok(())
    }

    async fn retrieve(&self, name: &str, ids: &[String]) -> Result<Vec<VectorPoint>> {
        let collections = self.collections.read().await;
        let entry = collections.get(name).ok_or_else(|| Self::missing(name))?;
        Ok(ids
            .iter()
            .filter_map(|id| entry.points.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::*;

    fn payload(owner: &str, resource: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ownerId".into(), Value::String(owner.into()));
        map.insert("resourceId".into(), Value::String(resource.into()));
        map
    }

    fn point(id: &str, dense: Vec<f32>, owner: &str, resource: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            dense,
            sparse: None,
            rerank: None,
            payload: payload(owner, resource),
        }
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites_in_place() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("c", vec![point("p1", vec![1.0, 0.0], "public", "r1")])
            .await
            .unwrap();
        index
            .upsert("c", vec![point("p1", vec![0.0, 1.0], "public", "r1")])
            .await
            .unwrap();
        let fetched = index.retrieve("c", &["p1".into()]).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].dense, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn owner_filter_isolates_tenants() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                "c",
                vec![
                    point("pa", vec![1.0, 0.0], "alice", "r1"),
                    point("pb", vec![1.0, 0.0], "bob", "r2"),
                ],
            )
            .await
            .unwrap();
        let results = index
            .dense_query("c", &[1.0, 0.0], 10, &PointFilter::owner("alice"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "pa");
    }

    #[tokio::test]
    async fn hybrid_prefers_agreement() {
        let index = MemoryVectorIndex::new();
        let mut strong_sparse = point("sparse-doc", vec![0.3, 0.7], "public", "r1");
        strong_sparse.sparse = Some(SparseVector {
            indices: vec![7],
            values: vec![5.0],
        });
        let mut both = point("both-doc", vec![0.9, 0.1], "public", "r1");
        both.sparse = Some(SparseVector {
            indices: vec![7],
            values: vec![1.0],
        });
        index
            .upsert("c", vec![strong_sparse, both, point("dense-doc", vec![0.8, 0.6], "public", "r1")])
            .await
            .unwrap();

        let results = index
            .hybrid_query(
                "c",
                &[1.0, 0.0],
                &SparseVector {
                    indices: vec![7],
                    values: vec![1.0],
                },
                3,
                &PointFilter::owner("public"),
            )
            .await
            .unwrap();
        // both-doc ranks well on both lists and wins the fusion.
        assert_eq!(results[0].id, "both-doc");
    }

    #[tokio::test]
    async fn rerank_scores_by_max_sim_over_candidates() {
        let index = MemoryVectorIndex::new();
        let mut on_topic = point("on-topic", vec![1.0, 0.0], "public", "r1");
        on_topic.rerank = Some(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let mut off_topic = point("off-topic", vec![1.0, 0.0], "public", "r1");
        off_topic.rerank = Some(vec![vec![-1.0, 0.0]]);
        index.upsert("c", vec![on_topic, off_topic]).await.unwrap();

        let query = vec![vec![1.0, 0.0]];
        let results = index
            .rerank(
                "c",
                &query,
                &["on-topic".into(), "off-topic".into(), "absent".into()],
                10,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "on-topic");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn delete_by_resource_filter_purges_only_that_resource() {
        let index = MemoryVectorIndex::new();
        index
            .upsert(
                "c",
                vec![
                    point("p1", vec![1.0, 0.0], "public", "r1"),
                    point("p2", vec![0.0, 1.0], "public", "r2"),
                ],
            )
            .await
            .unwrap();
        index
            .delete_by_filter("c", &PointFilter::resource("r1"))
            .await
            .unwrap();
        let remaining = index
            .dense_query("c", &[1.0, 1.0], 10, &PointFilter::owner("public"))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "p2");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let index = MemoryVectorIndex::new();
        index
            .upsert("c", vec![point("p1", vec![1.0, 0.0], "public", "r1")])
            .await
            .unwrap();
        let err = index
            .upsert("c", vec![point("p2", vec![1.0, 0.0, 0.0], "public", "r1")])
            .await;
        assert!(err.is_err());
    }
}

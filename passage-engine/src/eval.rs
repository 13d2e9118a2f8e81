//! Offline evaluation: stored test cases replayed through the query
//! engine, scored with Hit, Recall@K, and MRR.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use passage_core::{
    EvalCaseResult, EvalReport, EvalRun, EvalTestCase, PassageError, Result,
};

use crate::docstore::{list_typed, ns, put_typed, DocStore};
use crate::query::{QueryEngine, SearchRequest};

/// Results fetched per case.
const EVAL_TOP_K: usize = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvalTestCase {
    pub collection_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub query: String,
    pub expected_chunk_ids: Vec<String>,
}

pub struct Evaluator {
    docstore: Arc<dyn DocStore>,
    query: Arc<QueryEngine>,
}

impl Evaluator {
    pub fn new(docstore: Arc<dyn DocStore>, query: Arc<QueryEngine>) -> Self {
        Self { docstore, query }
    }

    pub async fn create_case(&self, request: CreateEvalTestCase) -> Result<EvalTestCase> {
        if request.query.trim().is_empty() || request.expected_chunk_ids.is_empty() {
            return Err(PassageError::Validation(
                "query and expectedChunkIds are required".into(),
            ));
        }
        let case = EvalTestCase {
            id: Uuid::new_v4().to_string(),
            collection_id: request.collection_id,
            owner_id: request.owner_id.unwrap_or_else(|| "public".into()),
            query: request.query,
            expected_chunk_ids: request.expected_chunk_ids,
            created_at: Utc::now(),
        };
        put_typed(self.docstore.as_ref(), ns::EVAL_CASES, &case.id, &case).await?;
        Ok(case)
    }

    pub async fn list_cases(
        &self,
        collection_id: &str,
        owner_id: &str,
    ) -> Result<Vec<EvalTestCase>> {
        let mut cases: Vec<EvalTestCase> = list_typed(self.docstore.as_ref(), ns::EVAL_CASES)
            .await?
            .into_iter()
            .filter(|c: &EvalTestCase| c.collection_id == collection_id && c.owner_id == owner_id)
            .collect();
        cases.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cases)
    }

    /// Run every stored case, aggregate, persist the run, return the
    /// report.
    pub async fn run(&self, collection_id: &str, owner_id: &str) -> Result<EvalRun> {
        let cases = self.list_cases(collection_id, owner_id).await?;
        if cases.is_empty() {
            return Err(PassageError::Validation(format!(
                "no eval cases for collection {collection_id} and owner {owner_id}"
            )));
        }

        let mut results = Vec::with_capacity(cases.len());
        for case in &cases {
            let response = self
                .query
                .search(SearchRequest {
                    query: case.query.clone(),
                    collection_id: collection_id.to_string(),
                    owner_id: Some(owner_id.to_string()),
                    resource_id: None,
                    top_k: EVAL_TOP_K,
                    min_score: None,
                    use_feedback: false,
                    is_review: false,
                    analytics: false,
                })
                .await?;
            let retrieved: Vec<String> = response.result.into_iter().map(|hit| hit.id).collect();
            results.push(score_case(case, retrieved));
        }

        let total = results.len();
        let hit_count = results.iter().filter(|r| r.hit).count();
        let report = EvalReport {
            total_cases: total,
            hit_count,
            overall_accuracy: hit_count as f64 / total as f64,
            average_recall: results.iter().map(|r| r.recall).sum::<f64>() / total as f64,
            mrr: results.iter().map(|r| r.reciprocal_rank).sum::<f64>() / total as f64,
            failed_cases: results.iter().filter(|r| !r.hit).cloned().collect(),
        };

        let run = EvalRun {
            id: Uuid::new_v4().to_string(),
            collection_id: collection_id.to_string(),
            owner_id: owner_id.to_string(),
            report,
            results,
            created_at: Utc::now(),
        };
        put_typed(self.docstore.as_ref(), ns::EVAL_RUNS, &run.id, &run).await?;
        info!(
            collection = collection_id,
            cases = total,
            hits = hit_count,
            "evaluation run complete"
        );
        Ok(run)
    }
}

/// Score one case against its retrieved ids.
fn score_case(case: &EvalTestCase, retrieved: Vec<String>) -> EvalCaseResult {
    let expected: HashSet<&String> = case.expected_chunk_ids.iter().collect();
    let matched = retrieved
        .iter()
        .filter(|id| expected.contains(id))
        .collect::<HashSet<_>>()
        .len();
    let reciprocal_rank = retrieved
        .iter()
        .position(|id| expected.contains(id))
        .map(|position| 1.0 / (position + 1) as f64)
        .unwrap_or(0.0);
    EvalCaseResult {
        case_id: case.id.clone(),
        query: case.query.clone(),
        hit: reciprocal_rank > 0.0,
        recall: matched as f64 / expected.len() as f64,
        reciprocal_rank,
        retrieved_chunk_ids: retrieved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(expected: &[&str]) -> EvalTestCase {
        EvalTestCase {
            id: "case".into(),
            collection_id: "c".into(),
            owner_id: "public".into(),
            query: "q".into(),
            expected_chunk_ids: expected.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    fn retrieved(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_position_hit_scores_full_rank() {
        let result = score_case(&case(&["a", "b"]), retrieved(&["a", "x", "b"]));
        assert!(result.hit);
        assert_eq!(result.reciprocal_rank, 1.0);
        assert_eq!(result.recall, 1.0);
    }

    #[test]
    fn later_hit_decays_reciprocal_rank() {
        let result = score_case(&case(&["b"]), retrieved(&["x", "y", "b"]));
        assert!(result.hit);
        assert!((result.reciprocal_rank - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.recall, 1.0);
    }

    #[test]
    fn miss_scores_zero_everywhere() {
        let result = score_case(&case(&["a"]), retrieved(&["x", "y"]));
        assert!(!result.hit);
        assert_eq!(result.reciprocal_rank, 0.0);
        assert_eq!(result.recall, 0.0);
    }

    #[test]
    fn hit_iff_reciprocal_rank_positive() {
        for (expected, got) in [
            (vec!["a"], vec!["a"]),
            (vec!["a"], vec!["b"]),
            (vec!["a", "b"], vec!["c", "b"]),
        ] {
            let expected: Vec<&str> = expected;
            let result = score_case(&case(&expected), retrieved(&got));
            assert_eq!(result.hit, result.reciprocal_rank > 0.0);
            assert!((0.0..=1.0).contains(&result.recall));
        }
    }
}

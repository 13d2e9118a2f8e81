//! Evaluation records: stored test cases and run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored retrieval test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalTestCase {
    pub id: String,
    pub collection_id: String,
    pub owner_id: String,
    pub query: String,
    pub expected_chunk_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The outcome of running one test case through the query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalCaseResult {
    pub case_id: String,
    pub query: String,
    /// Whether any expected id appeared in the retrieved set.
    pub hit: bool,
    /// |expected ∩ retrieved| / |expected|.
    pub recall: f64,
    /// 1 / (1-indexed position of the first hit), 0 when no hit.
    pub reciprocal_rank: f64,
    pub retrieved_chunk_ids: Vec<String>,
}

/// Aggregated metrics for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalReport {
    pub total_cases: usize,
    pub hit_count: usize,
    /// Hit rate over all cases.
    pub overall_accuracy: f64,
    pub average_recall: f64,
    pub mrr: f64,
    /// Cases that retrieved none of their expected chunks.
    pub failed_cases: Vec<EvalCaseResult>,
}

/// A persisted snapshot of a report plus every per-case result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRun {
    pub id: String,
    pub collection_id: String,
    pub owner_id: String,
    pub report: EvalReport,
    pub results: Vec<EvalCaseResult>,
    pub created_at: DateTime<Utc>,
}

//! End-to-end pipeline tests over in-memory backends: ingest → persist →
//! query, feedback fusion, evaluation, and poison-message handling.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use passage_adapter::FileAdapterStore;
use passage_core::{
    chunk_address, failed_queue, ChunkStrategy, CollectionSettings, FeedbackAction, IngestEvent,
    Resource, ResourceStatus, Result, SparseVector, INGEST_QUEUE,
};
use passage_embed::Embedder;
use passage_engine::broker::Broker;
use passage_engine::collections::CreateCollection;
use passage_engine::docstore::{get_typed, ns};
use passage_engine::eval::CreateEvalTestCase;
use passage_engine::feedback::VoteRequest;
use passage_engine::query::SearchRequest;
use passage_engine::resources::CreateResource;
use passage_engine::Engine;
use passage_index::{MemoryVectorIndex, PointFilter, VectorIndex};

const DIM: usize = 64;

/// Known test vocabulary pinned to distinct dimensions; anything else
/// hashes into the tail of the space.
const VOCAB: &[&str] = &[
    "cats", "purr", "dogs", "bark", "birds", "chirp", "mitochondria", "energy", "cell", "ribosome",
    "protein", "alpha", "beta", "gamma", "delta", "storage", "engine", "query",
];

/// Synonyms collapse before embedding, giving the test corpus a notion of
/// semantic similarity.
const SYNONYMS: &[(&str, &str)] = &[
    ("feline", "cats"),
    ("felines", "cats"),
    ("sound", "purr"),
    ("canine", "dogs"),
    ("powerhouse", "mitochondria"),
];

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            SYNONYMS
                .iter()
                .find(|(from, _)| *from == t)
                .map(|(_, to)| to.to_string())
                .unwrap_or_else(|| t.to_string())
        })
        .collect()
}

fn token_dim(token: &str) -> usize {
    if let Some(position) = VOCAB.iter().position(|v| *v == token) {
        return position;
    }
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    VOCAB.len() + (hasher.finish() as usize % (DIM - VOCAB.len()))
}

fn embed_tokens(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for token in tokens(text) {
        vector[token_dim(&token)] += 1.0;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

/// Deterministic bag-of-tokens embedder standing in for the model server.
struct TestEmbedder;

#[async_trait]
impl Embedder for TestEmbedder {
    async fn encode_dense(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_tokens(t)).collect())
    }

    async fn encode_sparse(&self, texts: &[String], _model: &str) -> Result<Vec<SparseVector>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut counts: HashMap<u32, f32> = HashMap::new();
                for token in tokens(t) {
                    *counts.entry(token_dim(&token) as u32).or_insert(0.0) += 1.0;
                }
                let mut indices: Vec<u32> = counts.keys().copied().collect();
                indices.sort_unstable();
                let values = indices.iter().map(|i| counts[i]).collect();
                SparseVector { indices, values }
            })
            .collect())
    }

    async fn encode_late_interaction(
        &self,
        texts: &[String],
        _model: &str,
    ) -> Result<Vec<Vec<Vec<f32>>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let token_rows: Vec<Vec<f32>> =
                    tokens(t).iter().map(|tok| embed_tokens(tok)).collect();
                if token_rows.is_empty() {
                    vec![vec![0.0; DIM]]
                } else {
                    token_rows
                }
            })
            .collect())
    }
}

struct Harness {
    engine: Engine,
    _adapter_dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let adapter_dir = tempfile::tempdir().unwrap();
    let engine = Engine::builder()
        .embedder(Arc::new(TestEmbedder))
        .index(Arc::new(MemoryVectorIndex::new()))
        .adapter_store(Arc::new(FileAdapterStore::new(adapter_dir.path())))
        .build()
        .unwrap();
    engine.spawn_workers().await;
    Harness {
        engine,
        _adapter_dir: adapter_dir,
    }
}

fn settings(chunk_size: usize) -> CollectionSettings {
    CollectionSettings {
        dense_model: "BAAI/bge-small-en-v1.5".into(),
        sparse_model: None,
        reranker_model: None,
        chunk_size,
        chunk_overlap: 0,
        strategy: ChunkStrategy::Recursive,
        chunking_url: None,
        keep_duplicate: false,
    }
}

async fn create_collection(engine: &Engine, settings: CollectionSettings) -> String {
    engine
        .collections
        .create(CreateCollection {
            name: "test".into(),
            description: None,
            metadata: None,
            settings,
        })
        .await
        .unwrap()
        .id
}

async fn ingest_text(engine: &Engine, collection_id: &str, content: &str) -> String {
    let resource = engine
        .resources
        .create(CreateResource {
            collection_id: collection_id.to_string(),
            owner_id: None,
            title: None,
            url: None,
            content: Some(content.to_string()),
            description: None,
            metadata: None,
            chunk_overrides: None,
        })
        .await
        .unwrap();
    resource.id
}

/// Poll until the resource reaches a terminal status for this stage.
async fn wait_for_status(engine: &Engine, resource_id: &str, expected: ResourceStatus) {
    for _ in 0..200 {
        let resource: Option<Resource> =
            get_typed(engine.docstore.as_ref(), ns::RESOURCES, resource_id)
                .await
                .unwrap();
        if let Some(status) = resource.and_then(|r| r.status()) {
            if status.status == expected {
                return;
            }
            if status.status == ResourceStatus::Error {
                panic!("resource errored: {:?}", status.message);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("resource {resource_id} never reached {expected:?}");
}

/// Poll until the collection's point count stabilizes at `expected`.
async fn wait_for_points(engine: &Engine, collection_id: &str, expected: usize) {
    let probe = embed_tokens("query");
    for _ in 0..200 {
        if engine.index.collection_exists(collection_id).await.unwrap() {
            let points = engine
                .index
                .dense_query(collection_id, &probe, 100, &PointFilter::owner("public"))
                .await
                .unwrap();
            if points.len() == expected {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("collection {collection_id} never reached {expected} points");
}

#[tokio::test]
async fn ingest_then_query_ranks_the_right_chunk_first() {
    let h = harness().await;
    let collection = create_collection(&h.engine, settings(12)).await;
    let mut realtime = h.engine.subscribe_realtime();
    let resource = ingest_text(&h.engine, &collection, "Cats purr. Dogs bark. Birds chirp.").await;

    wait_for_status(&h.engine, &resource, ResourceStatus::Chunked).await;
    wait_for_points(&h.engine, &collection, 3).await;

    // The worker announced the status change on the realtime channel.
    let message = tokio::time::timeout(Duration::from_secs(1), realtime.recv())
        .await
        .expect("no realtime message")
        .unwrap();
    assert_eq!(message.resource_id, resource);
    assert_eq!(message.status.status, ResourceStatus::Chunked);

    let response = h
        .engine
        .query
        .search(SearchRequest {
            query: "feline sound".into(),
            collection_id: collection.clone(),
            owner_id: None,
            resource_id: None,
            top_k: 5,
            min_score: None,
            use_feedback: false,
            is_review: false,
            analytics: false,
        })
        .await
        .unwrap();

    assert_eq!(response.result.len(), 3);
    let top_content = response.result[0].payload["content"].as_str().unwrap();
    assert!(top_content.contains("Cats purr"), "got {top_content}");
}

#[tokio::test]
async fn reingesting_identical_content_is_idempotent() {
    let h = harness().await;
    let collection = create_collection(&h.engine, settings(12)).await;

    let first = ingest_text(&h.engine, &collection, "Cats purr. Dogs bark.").await;
    wait_for_status(&h.engine, &first, ResourceStatus::Chunked).await;
    wait_for_points(&h.engine, &collection, 2).await;

    let second = ingest_text(&h.engine, &collection, "Cats purr. Dogs bark.").await;
    wait_for_status(&h.engine, &second, ResourceStatus::Chunked).await;
    // Same content under the same ownership overwrites in place.
    tokio::time::sleep(Duration::from_millis(100)).await;
    wait_for_points(&h.engine, &collection, 2).await;

    // And the ids are the content addresses.
    let expected = chunk_address(&collection, "public", "Cats purr.", None);
    let fetched = h
        .engine
        .index
        .retrieve(&collection, &[expected.clone()])
        .await
        .unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].id, expected);
}

#[tokio::test]
async fn owner_isolation_holds_across_queries() {
    let h = harness().await;
    let collection = create_collection(&h.engine, settings(200)).await;

    for (owner, text) in [("alice", "Cats purr."), ("bob", "Dogs bark.")] {
        let resource = h
            .engine
            .resources
            .create(CreateResource {
                collection_id: collection.clone(),
                owner_id: Some(owner.into()),
                title: None,
                url: None,
                content: Some(text.into()),
                description: None,
                metadata: None,
                chunk_overrides: None,
            })
            .await
            .unwrap();
        wait_for_status(&h.engine, &resource.id, ResourceStatus::Chunked).await;
    }

    // Wait for both owners' points to land.
    for _ in 0..200 {
        let any_bob = h
            .engine
            .index
            .dense_query(
                &collection,
                &embed_tokens("dogs"),
                10,
                &PointFilter::owner("bob"),
            )
            .await
            .unwrap();
        if !any_bob.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let alice_results = h
        .engine
        .query
        .search(SearchRequest {
            query: "dogs cats".into(),
            collection_id: collection.clone(),
            owner_id: Some("alice".into()),
            resource_id: None,
            top_k: 10,
            min_score: None,
            use_feedback: false,
            is_review: false,
            analytics: false,
        })
        .await
        .unwrap();
    assert!(!alice_results.result.is_empty());
    for hit in &alice_results.result {
        assert_eq!(hit.payload["ownerId"].as_str(), Some("alice"));
    }
}

#[tokio::test]
async fn hybrid_with_rerank_finds_the_gold_chunk() {
    let h = harness().await;
    let mut full = settings(200);
    full.sparse_model = Some("prithivida/Splade_PP_en_v1".into());
    full.reranker_model = Some("colbert-ir/colbertv2.0".into());
    let collection = create_collection(&h.engine, full).await;

    let corpus = [
        "Mitochondria produce energy.",
        "Dogs bark at birds.",
        "Cats purr near the engine.",
        "Ribosome builds protein.",
        "Alpha beta gamma delta.",
    ];
    for text in corpus {
        let resource = ingest_text(&h.engine, &collection, text).await;
        wait_for_status(&h.engine, &resource, ResourceStatus::Chunked).await;
    }
    wait_for_points(&h.engine, &collection, corpus.len()).await;

    let response = h
        .engine
        .query
        .search(SearchRequest {
            query: "mitochondria energy".into(),
            collection_id: collection.clone(),
            owner_id: None,
            resource_id: None,
            top_k: 5,
            min_score: None,
            use_feedback: false,
            is_review: false,
            analytics: false,
        })
        .await
        .unwrap();

    let top = response.result[0].payload["content"].as_str().unwrap();
    assert!(top.contains("Mitochondria"), "got {top}");
}

#[tokio::test]
async fn upvotes_fuse_into_future_rankings() {
    let h = harness().await;
    let collection = create_collection(&h.engine, settings(200)).await;

    // The gold chunk shares one token with the query; the decoys share one
    // too, so raw ranking is a toss-up.
    let gold_text = "Delta storage engine.";
    let decoys = ["Alpha storage layer.", "Beta storage layer."];
    let gold_resource = ingest_text(&h.engine, &collection, gold_text).await;
    wait_for_status(&h.engine, &gold_resource, ResourceStatus::Chunked).await;
    for text in decoys {
        let resource = ingest_text(&h.engine, &collection, text).await;
        wait_for_status(&h.engine, &resource, ResourceStatus::Chunked).await;
    }
    wait_for_points(&h.engine, &collection, 3).await;

    let gold_chunk = chunk_address(&collection, "public", gold_text, None);
    let query = "storage query";

    for _ in 0..3 {
        h.engine
            .feedback
            .vote(VoteRequest {
                collection_id: collection.clone(),
                query: query.into(),
                chunk_id: gold_chunk.clone(),
                resource_id: gold_resource.clone(),
                action: FeedbackAction::Upvote,
                owner_id: None,
            })
            .await
            .unwrap();
    }

    // Three upvotes land in one merged feedback doc.
    for _ in 0..200 {
        let doc = get_typed::<passage_core::FeedbackDoc>(
            h.engine.docstore.as_ref(),
            ns::FEEDBACK,
            &passage_core::feedback_address(&collection, "public", query),
        )
        .await
        .unwrap();
        if doc
            .as_ref()
            .and_then(|d| d.hits.get(&gold_chunk))
            .map(|hit| hit.count)
            == Some(3)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = h
        .engine
        .query
        .search(SearchRequest {
            query: query.into(),
            collection_id: collection.clone(),
            owner_id: None,
            resource_id: None,
            top_k: 3,
            min_score: None,
            use_feedback: true,
            is_review: false,
            analytics: false,
        })
        .await
        .unwrap();
    assert_eq!(response.result[0].id, gold_chunk);

    // Upvotes also trained the adapter.
    assert_eq!(
        h.engine.adapters.training_count(&collection).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn evaluator_reports_hits_and_failures() {
    let h = harness().await;
    let collection = create_collection(&h.engine, settings(200)).await;

    let corpus = ["Cats purr.", "Dogs bark.", "Birds chirp."];
    for text in corpus {
        let resource = ingest_text(&h.engine, &collection, text).await;
        wait_for_status(&h.engine, &resource, ResourceStatus::Chunked).await;
    }
    wait_for_points(&h.engine, &collection, 3).await;

    // Two answerable cases, one impossible one.
    let cases = [
        ("feline sound", chunk_address(&collection, "public", "Cats purr.", None)),
        ("canine bark", chunk_address(&collection, "public", "Dogs bark.", None)),
        ("quantum chromodynamics", "no-such-chunk".to_string()),
    ];
    for (query, expected) in &cases {
        h.engine
            .evaluator
            .create_case(CreateEvalTestCase {
                collection_id: collection.clone(),
                owner_id: None,
                query: query.to_string(),
                expected_chunk_ids: vec![expected.clone()],
            })
            .await
            .unwrap();
    }

    let run = h.engine.evaluator.run(&collection, "public").await.unwrap();
    assert_eq!(run.report.total_cases, 3);
    assert_eq!(run.report.hit_count, 2);
    assert!((run.report.overall_accuracy - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(
        run.report.failed_cases.len(),
        run.report.total_cases - run.report.hit_count
    );
    assert!(run.report.mrr > 0.0);
    for result in &run.results {
        assert_eq!(result.hit, result.reciprocal_rank > 0.0);
        assert!((0.0..=1.0).contains(&result.recall));
    }
}

#[tokio::test]
async fn poison_ingest_message_dead_letters_without_stalling() {
    let h = harness().await;
    let collection = create_collection(&h.engine, settings(200)).await;

    let mut failed_rx = h
        .engine
        .broker
        .subscribe(&failed_queue(INGEST_QUEUE))
        .await
        .unwrap();

    // A structurally valid event for a resource that does not exist.
    let poison = IngestEvent::new(
        passage_core::IngestAction::Chunk,
        passage_core::IngestData {
            resource_id: "ghost".into(),
            collection_id: collection.clone(),
            url: None,
        },
    );
    h.engine
        .broker
        .publish(INGEST_QUEUE, serde_json::to_value(&poison).unwrap())
        .await
        .unwrap();

    let dead = tokio::time::timeout(Duration::from_secs(2), failed_rx.recv())
        .await
        .expect("dead letter never arrived")
        .unwrap();
    assert!(dead["error"].as_str().unwrap().contains("ghost"));

    // The queue keeps flowing afterwards.
    let resource = ingest_text(&h.engine, &collection, "Cats purr.").await;
    wait_for_status(&h.engine, &resource, ResourceStatus::Chunked).await;
}

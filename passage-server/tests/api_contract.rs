//! HTTP contract tests against a real listener.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use passage_adapter::FileAdapterStore;
use passage_core::{Result, SparseVector};
use passage_embed::Embedder;
use passage_engine::Engine;
use passage_index::MemoryVectorIndex;
use passage_server::{app_router, state::AppState};

const DIM: usize = 32;

fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        vector[hasher.finish() as usize % DIM] += 1.0;
    }
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn encode_dense(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed(t)).collect())
    }

    async fn encode_sparse(&self, texts: &[String], _model: &str) -> Result<Vec<SparseVector>> {
        Ok(texts
            .iter()
            .map(|t| {
                let dense = embed(t);
                let (indices, values) = dense
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v > 0.0)
                    .map(|(i, v)| (i as u32, *v))
                    .unzip();
                SparseVector { indices, values }
            })
            .collect())
    }

    async fn encode_late_interaction(
        &self,
        texts: &[String],
        _model: &str,
    ) -> Result<Vec<Vec<Vec<f32>>>> {
        Ok(texts.iter().map(|t| vec![embed(t)]).collect())
    }
}

async fn spawn_server() -> (String, tempfile::TempDir, tokio::task::JoinHandle<()>) {
    let adapter_dir = tempfile::tempdir().expect("tempdir");
    let engine = Arc::new(
        Engine::builder()
            .embedder(Arc::new(HashEmbedder))
            .index(Arc::new(MemoryVectorIndex::new()))
            .adapter_store(Arc::new(FileAdapterStore::new(adapter_dir.path())))
            .build()
            .expect("engine build"),
    );
    engine.spawn_workers().await;
    let app = app_router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{addr}"), adapter_dir, handle)
}

fn collection_body() -> Value {
    json!({
        "name": "docs",
        "settings": {
            "denseModel": "BAAI/bge-small-en-v1.5",
            "chunkSize": 200,
            "chunkOverlap": 0,
            "strategy": "recursive"
        }
    })
}

#[tokio::test]
async fn health_and_catalog_respond() {
    let (base, _dir, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(health["status"], "ok");

    let models: Value = client
        .get(format!("{base}/utility/encoding-models"))
        .send()
        .await
        .expect("models response")
        .json()
        .await
        .expect("models json");
    assert!(models["models"]["denseModels"].as_array().unwrap().len() >= 1);
    assert!(models["models"]["sparseModels"].is_array());
    assert!(models["models"]["rerankerModels"].is_array());

    handle.abort();
}

#[tokio::test]
async fn collection_crud_and_validation() {
    let (base, _dir, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{base}/collection"))
        .json(&collection_body())
        .send()
        .await
        .expect("create response");
    assert_eq!(created.status(), 201);
    let collection: Value = created.json().await.expect("collection json");
    let id = collection["id"].as_str().expect("collection id");

    let fetched: Value = client
        .get(format!("{base}/collection/{id}"))
        .send()
        .await
        .expect("get response")
        .json()
        .await
        .expect("get json");
    assert_eq!(fetched["name"], "docs");

    // Unknown model is a 400 with the error envelope.
    let bad = client
        .post(format!("{base}/collection"))
        .json(&json!({
            "name": "bad",
            "settings": { "denseModel": "made/up" }
        }))
        .send()
        .await
        .expect("bad response");
    assert_eq!(bad.status(), 400);
    let body: Value = bad.json().await.expect("error json");
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "validation");

    // Unknown collection is a 404.
    let missing = client
        .get(format!("{base}/collection/nope"))
        .send()
        .await
        .expect("missing response");
    assert_eq!(missing.status(), 404);

    handle.abort();
}

#[tokio::test]
async fn ingest_and_search_round_trip() {
    let (base, _dir, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let collection: Value = client
        .post(format!("{base}/collection"))
        .json(&collection_body())
        .send()
        .await
        .expect("create collection")
        .json()
        .await
        .expect("collection json");
    let collection_id = collection["id"].as_str().unwrap().to_string();

    let resource = client
        .post(format!("{base}/resource"))
        .json(&json!({
            "collectionId": collection_id,
            "content": "Cats purr when they are happy."
        }))
        .send()
        .await
        .expect("create resource");
    assert_eq!(resource.status(), 201);
    let resource: Value = resource.json().await.expect("resource json");
    let resource_id = resource["id"].as_str().unwrap().to_string();

    // Wait for the pipeline to sync chunks into the document store.
    let mut chunks = json!({ "chunks": [] });
    for _ in 0..200 {
        chunks = client
            .get(format!("{base}/resource/{resource_id}/chunks"))
            .send()
            .await
            .expect("chunks response")
            .json()
            .await
            .expect("chunks json");
        if !chunks["chunks"].as_array().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(chunks["chunks"].as_array().unwrap().len(), 1);

    // The vector-store sync runs on its own queue; poll the search until
    // the point lands.
    let mut results = json!({ "result": [] });
    for _ in 0..200 {
        results = client
            .post(format!("{base}/search"))
            .json(&json!({
                "query": "cats purr happy",
                "collectionId": collection_id,
            }))
            .send()
            .await
            .expect("search response")
            .json()
            .await
            .expect("search json");
        if !results["result"].as_array().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let hits = results["result"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0]["payload"]["content"]
        .as_str()
        .unwrap()
        .contains("Cats purr"));

    // Missing query is a validation error.
    let bad = client
        .post(format!("{base}/search"))
        .json(&json!({ "query": "", "collectionId": collection_id }))
        .send()
        .await
        .expect("bad search");
    assert_eq!(bad.status(), 400);

    handle.abort();
}

#[tokio::test]
async fn feedback_vote_and_eval_contract() {
    let (base, _dir, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let collection: Value = client
        .post(format!("{base}/collection"))
        .json(&collection_body())
        .send()
        .await
        .expect("create collection")
        .json()
        .await
        .expect("collection json");
    let collection_id = collection["id"].as_str().unwrap().to_string();

    let ack: Value = client
        .post(format!("{base}/feedback/vote"))
        .json(&json!({
            "collectionId": collection_id,
            "query": "cats",
            "chunkId": "some-chunk",
            "resourceId": "some-resource",
            "action": "upvote"
        }))
        .send()
        .await
        .expect("vote response")
        .json()
        .await
        .expect("vote json");
    assert_eq!(ack["success"], true);

    // Expired or unknown review links are 404s.
    let expired = client
        .get(format!("{base}/feedback/vote/unknown-ref/upvote"))
        .send()
        .await
        .expect("expired response");
    assert_eq!(expired.status(), 404);

    // Eval run without cases is a 400.
    let empty_run = client
        .post(format!("{base}/eval/run/{collection_id}/public"))
        .send()
        .await
        .expect("run response");
    assert_eq!(empty_run.status(), 400);

    handle.abort();
}

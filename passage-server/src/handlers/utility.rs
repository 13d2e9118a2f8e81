use axum::Json;
use serde_json::json;

use passage_embed::EncodingModels;

pub async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "passage",
        "message": "passage retrieval backend is running",
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "passage" }))
}

pub async fn encoding_models() -> Json<serde_json::Value> {
    Json(json!({ "models": EncodingModels::catalog() }))
}

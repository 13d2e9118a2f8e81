use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use passage_core::Resource;
use passage_engine::resources::{CreateResource, UpdateResource};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateResource>,
) -> ApiResult<(StatusCode, Json<Resource>)> {
    let resource = state.engine.resources.create(request).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(state.engine.resources.get(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateResource>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(state.engine.resources.update(&id, request).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Resource>> {
    Ok(Json(state.engine.resources.delete(&id).await?))
}

pub async fn chunks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let chunks = state.engine.resources.chunks(&id).await?;
    Ok(Json(json!({ "chunks": chunks })))
}

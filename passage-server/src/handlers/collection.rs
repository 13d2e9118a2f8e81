use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use passage_core::{Collection, UpdateCollection};
use passage_engine::collections::{CreateCollection, ResourceListing};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateCollection>,
) -> ApiResult<(StatusCode, Json<Collection>)> {
    let collection = state.engine.collections.create(request).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Collection>> {
    Ok(Json(state.engine.collections.get(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCollection>,
) -> ApiResult<Json<Collection>> {
    Ok(Json(state.engine.collections.update(&id, request).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListingParams {
    #[serde(default)]
    pub owner_id: Option<String>,
    /// `?content=true` includes resource bodies in the listing.
    #[serde(default)]
    pub content: Option<bool>,
}

pub async fn resources(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ResourceListingParams>,
) -> ApiResult<Json<ResourceListing>> {
    let listing = state
        .engine
        .collections
        .list_resources(
            &id,
            params.owner_id.as_deref(),
            params.content.unwrap_or(false),
        )
        .await?;
    Ok(Json(listing))
}

use axum::extract::State;
use axum::Json;

use passage_engine::query::{SearchRequest, SearchResponse};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    Ok(Json(state.engine.query.search(request).await?))
}

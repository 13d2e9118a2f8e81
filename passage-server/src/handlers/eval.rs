use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use passage_core::{EvalReport, EvalTestCase};
use passage_engine::eval::CreateEvalTestCase;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_case(
    State(state): State<AppState>,
    Json(request): Json<CreateEvalTestCase>,
) -> ApiResult<(StatusCode, Json<EvalTestCase>)> {
    let case = state.engine.evaluator.create_case(request).await?;
    Ok((StatusCode::CREATED, Json(case)))
}

pub async fn list_cases(
    State(state): State<AppState>,
    Path((collection_id, owner_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let cases = state
        .engine
        .evaluator
        .list_cases(&collection_id, &owner_id)
        .await?;
    let total = cases.len();
    Ok(Json(json!({
        "testCases": cases,
        "metadata": { "total": total },
    })))
}

pub async fn run(
    State(state): State<AppState>,
    Path((dataset_id, owner_id)): Path<(String, String)>,
) -> ApiResult<Json<EvalReport>> {
    let run = state.engine.evaluator.run(&dataset_id, &owner_id).await?;
    Ok(Json(run.report))
}

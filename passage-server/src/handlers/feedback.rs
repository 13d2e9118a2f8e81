use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;

use passage_core::{FeedbackAction, PassageError};
use passage_engine::feedback::{VoteAck, VoteRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn vote(
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<Json<VoteAck>> {
    Ok(Json(state.engine.feedback.vote(request).await?))
}

/// Review-link vote: resolves the opaque reference and acks with a small
/// HTML page. 404 once the link has expired.
pub async fn vote_by_reference(
    State(state): State<AppState>,
    Path((reference_id, action)): Path<(String, String)>,
) -> ApiResult<Html<String>> {
    let action = match action.as_str() {
        "upvote" => FeedbackAction::Upvote,
        "downvote" => FeedbackAction::Downvote,
        other => {
            return Err(ApiError(PassageError::Validation(format!(
                "unknown action '{other}'"
            ))))
        }
    };
    state
        .engine
        .feedback
        .vote_by_reference(&reference_id, action)
        .await?;
    Ok(Html(
        "<html><body><p>Thanks — your feedback was recorded.</p></body></html>".to_string(),
    ))
}

//! HTTP mapping for engine errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use passage_core::PassageError;

/// Wraps [`PassageError`] for axum extractors and handlers.
#[derive(Debug)]
pub struct ApiError(pub PassageError);

impl From<PassageError> for ApiError {
    fn from(error: PassageError) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            PassageError::Validation(_) | PassageError::DimensionMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            PassageError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "status": "error",
            "message": self.0.to_string(),
            "code": self.0.code(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

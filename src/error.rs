use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::services::ledger_service::LedgerError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String), // 400
    NotFound(String), // 404
    InternalError, // 500
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error".to_string(),
            ),
        };

        let body = Json(json!({ "message": message }));
        (status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => ApiError::BadRequest(msg.to_string()),
            LedgerError::InsufficientBalance => ApiError::BadRequest(err.to_string()),
            LedgerError::NotFound => ApiError::NotFound(err.to_string()),
            LedgerError::AccountNumbersExhausted(_) | LedgerError::Storage(_) => {
                tracing::error!(
                    error = %err,
                    source = ?std::error::Error::source(&err),
                    "ledger operation failed"
                );
                ApiError::InternalError
            }
        }
    }
}

// Bodies axum cannot extract still answer with the `{"message"}` shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "request body rejected");
        ApiError::BadRequest(rejection.body_text())
    }
}

use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};
use serde_json::json;

use crate::{error::ApiError, state::AppState};

pub async fn index() -> &'static str {
    "MiniBank API is running..."
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "Server is running"
    }))
}

pub async fn store_health_check(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    state.ledger.ping().await?;

    Ok(Json(json!({
        "status": "OK",
        "message": "Store reachable"
    })))
}

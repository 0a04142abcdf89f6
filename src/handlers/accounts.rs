use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::account::{AccountDetailResponse, AccountResponse, CreateAccountRequest},
    models::transaction::{MovementRequest, MovementResponse},
    state::AppState,
};

// Malformed ids cannot name an account, so they are reported as missing.
fn parse_account_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::NotFound("Account not found".to_string()))
}

pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let account = state.ledger.create_account(payload).await?;
    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

pub async fn list_accounts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.ledger.list_accounts().await?;
    let resp: Vec<AccountResponse> = accounts.into_iter().map(AccountResponse::from).collect();
    Ok(Json(resp))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = parse_account_id(&account_id)?;
    let detail = state.ledger.account_detail(account_id).await?;
    Ok(Json(AccountDetailResponse::new(
        detail.account,
        detail.transactions,
    )))
}

pub async fn deposit(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    payload: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = parse_account_id(&account_id)?;
    let Json(payload) = payload?;
    let moved = state.ledger.deposit(account_id, payload).await?;
    Ok(Json(MovementResponse::from(moved)))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    payload: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = parse_account_id(&account_id)?;
    let Json(payload) = payload?;
    let moved = state.ledger.withdraw(account_id, payload).await?;
    Ok(Json(MovementResponse::from(moved)))
}

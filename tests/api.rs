use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use minibank::{
    create_app,
    db::{InMemoryLedgerStore, LedgerStore, StoreError, StoreResult},
    models::account::{Account, NewAccount},
    models::transaction::{NewTransaction, Transaction},
    services::ledger_service::LedgerService,
    state::AppState,
};

fn app() -> Router {
    app_with(Arc::new(InMemoryLedgerStore::new()))
}

fn app_with(store: Arc<dyn LedgerStore>) -> Router {
    create_app(AppState {
        ledger: LedgerService::new(store, 5),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    match body {
        Some(body) => send_raw(app, method, uri, body.to_string()).await,
        None => {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            dispatch(app, request).await
        }
    }
}

/// Sends `body` verbatim as `application/json`, even when it is not valid JSON.
async fn send_raw(app: &Router, method: &str, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    dispatch(app, request).await
}

async fn dispatch(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn open_account(app: &Router, holder: &str, initial: Value) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/accounts",
        Some(json!({ "holderName": holder, "initialDeposit": initial })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn root_and_health_respond() {
    let app = app();

    let response = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"MiniBank API is running...");

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");

    let (status, body) = send(&app, "GET", "/health/store", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Store reachable");
}

#[tokio::test]
async fn create_account_returns_created_account() {
    let app = app();
    let body = open_account(&app, "  Alice  ", json!(100.00)).await;

    assert_eq!(body["holderName"], "Alice");
    assert_eq!(body["balance"], json!(100.0));
    let number = body["accountNumber"].as_str().unwrap();
    assert!(number.starts_with("AC"));
    assert_eq!(number.len(), 8);
    assert!(body["id"].as_str().is_some());
    assert!(body["createdAt"].as_str().is_some());
    assert!(body.get("transactions").is_none());
}

#[tokio::test]
async fn create_account_validates_input() {
    let app = app();

    let (status, body) = send(&app, "POST", "/accounts", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Holder name is required");

    let (status, _) = send(&app, "POST", "/accounts", Some(json!({ "holderName": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/accounts",
        Some(json!({ "holderName": "Eve", "initialDeposit": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Initial deposit cannot be negative");

    let (_, accounts) = send(&app, "GET", "/accounts", None).await;
    assert_eq!(accounts, json!([]));
}

#[tokio::test]
async fn unreadable_bodies_get_json_bad_requests() {
    let app = app();

    let (status, body) = send(&app, "POST", "/accounts", Some(json!({ "holderName": 123 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("holderName"));

    for raw in [r#"{"holderName": "A""#, "", "not json"] {
        let (status, body) = send_raw(&app, "POST", "/accounts", raw.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{raw:?}");
        assert!(body["message"].is_string(), "{raw:?}");
    }

    let (_, accounts) = send(&app, "GET", "/accounts", None).await;
    assert_eq!(accounts, json!([]));

    let acc = open_account(&app, "Fay", json!(10)).await;
    let id = acc["id"].as_str().unwrap();
    for path in ["deposit", "withdraw"] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/accounts/{id}/{path}"),
            Some(json!({ "amount": 5, "description": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert!(body["message"].as_str().unwrap().contains("description"));

        let (status, body) =
            send_raw(&app, "POST", &format!("/accounts/{id}/{path}"), "{".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert!(body["message"].is_string());
    }

    let (_, detail) = send(&app, "GET", &format!("/accounts/{id}"), None).await;
    assert_eq!(detail["account"]["balance"], json!(10.0));
    assert_eq!(detail["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn initial_deposit_limits_name_the_field() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/accounts",
        Some(json!({ "holderName": "Gil", "initialDeposit": 1e-7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Initial deposit must have at most two decimal places"
    );
}

#[tokio::test]
async fn alice_detail_has_initial_deposit() {
    let app = app();
    let created = open_account(&app, "Alice", json!("100.00")).await;
    let id = created["id"].as_str().unwrap();

    let (status, detail) = send(&app, "GET", &format!("/accounts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["account"]["balance"], json!(100.0));

    let txs = detail["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["type"], "deposit");
    assert_eq!(txs[0]["amount"], json!(100.0));
    assert_eq!(txs[0]["description"], "Initial deposit");
    assert_eq!(txs[0]["account"], json!(id));
}

#[tokio::test]
async fn bob_scenario_over_http() {
    let app = app();
    let bob = open_account(&app, "Bob", json!(0)).await;
    let id = bob["id"].as_str().unwrap();
    assert_eq!(bob["balance"], json!(0.0));

    let (_, detail) = send(&app, "GET", &format!("/accounts/{id}"), None).await;
    assert_eq!(detail["transactions"], json!([]));

    let (status, moved) = send(
        &app,
        "POST",
        &format!("/accounts/{id}/deposit"),
        Some(json!({ "amount": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["account"]["balance"], json!(50.0));
    assert_eq!(moved["transaction"]["type"], "deposit");
    assert_eq!(moved["transaction"]["description"], "Deposit");

    let (status, moved) = send(
        &app,
        "POST",
        &format!("/accounts/{id}/withdraw"),
        Some(json!({ "amount": 20, "description": "Groceries" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["account"]["balance"], json!(30.0));
    assert_eq!(moved["transaction"]["type"], "withdrawal");
    assert_eq!(moved["transaction"]["description"], "Groceries");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/accounts/{id}/withdraw"),
        Some(json!({ "amount": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Insufficient balance");

    let (_, detail) = send(&app, "GET", &format!("/accounts/{id}"), None).await;
    assert_eq!(detail["account"]["balance"], json!(30.0));
    let txs = detail["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["type"], "withdrawal");
    assert_eq!(txs[0]["amount"], json!(20.0));
    assert_eq!(txs[1]["type"], "deposit");
}

#[tokio::test]
async fn invalid_amounts_are_rejected() {
    let app = app();
    let acc = open_account(&app, "Dan", json!(10)).await;
    let id = acc["id"].as_str().unwrap();

    for (path, amount) in [
        ("deposit", json!(0)),
        ("deposit", json!(-1)),
        ("deposit", json!("abc")),
        ("withdraw", json!(0)),
        ("withdraw", Value::Null),
    ] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/accounts/{id}/{path}"),
            Some(json!({ "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path} {amount}");
        assert_eq!(body["message"], "Amount must be > 0");
    }

    let (_, detail) = send(&app, "GET", &format!("/accounts/{id}"), None).await;
    assert_eq!(detail["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(detail["account"]["balance"], json!(10.0));
}

#[tokio::test]
async fn unknown_accounts_are_not_found() {
    let app = app();
    let missing = Uuid::new_v4();

    let (status, body) = send(&app, "GET", &format!("/accounts/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "Account not found" }));

    let (status, _) = send(&app, "GET", "/accounts/not-an-id", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for path in ["deposit", "withdraw"] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/accounts/{missing}/{path}"),
            Some(json!({ "amount": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn accounts_list_newest_first() {
    let app = app();
    for name in ["One", "Two", "Three"] {
        open_account(&app, name, json!(0)).await;
    }

    let (status, body) = send(&app, "GET", "/accounts", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["holderName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Three", "Two", "One"]);
}

#[tokio::test]
async fn api_prefix_serves_the_same_routes() {
    let app = app();
    let (status, created) = send(
        &app,
        "POST",
        "/api/accounts",
        Some(json!({ "holderName": "Prefixed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, listed) = send(&app, "GET", "/accounts", None).await;
    assert_eq!(listed[0]["id"], created["id"]);

    let id = created["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/accounts/{id}/deposit"),
        Some(json!({ "amount": "7.25" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Store whose backend is always down.
struct UnavailableStore;

#[async_trait]
impl LedgerStore for UnavailableStore {
    async fn create_account(
        &self,
        _account: NewAccount,
        _opening: Option<NewTransaction>,
    ) -> StoreResult<Account> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn get_account(&self, _account_id: Uuid) -> StoreResult<Option<Account>> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn list_transactions(&self, _account_id: Uuid) -> StoreResult<Vec<Transaction>> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn apply_movement(
        &self,
        _account_id: Uuid,
        _entry: NewTransaction,
    ) -> StoreResult<(Account, Transaction)> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[tokio::test]
async fn storage_failures_are_generic_server_errors() {
    let app = app_with(Arc::new(UnavailableStore));

    let (status, body) = send(&app, "GET", "/accounts", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": "Server error" }));

    let (status, _) = send(
        &app,
        "POST",
        "/accounts",
        Some(json!({ "holderName": "Zed" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&app, "GET", "/health/store", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

//! Action API Integration Tests
//!
//! Full HTTP request/response cycles for `/invoke` against in-memory and
//! SQLite table stores.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use action_group::api::{self, ActionState};
use action_group::store::{InMemoryTableStore, SqliteTableStore, TableStore};

const TABLE: &str = "transactions";

fn setup_test_app(store: Arc<dyn TableStore>) -> axum::Router {
    api::router().with_state(ActionState {
        store,
        table: TABLE.to_string(),
    })
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).expect("Invalid JSON response");
    (status, value)
}

fn invoke_request(envelope: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/invoke")
        .header("content-type", "application/json")
        .body(Body::from(envelope.to_string()))
        .unwrap()
}

fn agent_envelope() -> Value {
    json!({
        "messageVersion": "1.0",
        "agent": {"name": "accura", "id": "AGENT1", "alias": "TSTALIASID", "version": "DRAFT"},
        "inputText": "What are my motor vehicle expenses?",
        "sessionId": "session-1",
        "actionGroup": "transactions-action",
        "apiPath": "/transactions",
        "httpMethod": "GET",
        "sessionAttributes": {"clientId": "c-42"},
        "promptSessionAttributes": {"financialYear": "2024"}
    })
}

fn records(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|i| json!({"id": {"S": format!("txn-{i}")}, "amount": {"N": format!("{}", i * 100)}}))
        .collect()
}

fn body_of(document: &Value) -> Value {
    let text = document["response"]["responseBody"]["application/json"]["body"]
        .as_str()
        .expect("body is JSON text");
    serde_json::from_str(text).expect("body text is JSON")
}

#[tokio::test]
async fn test_health_check() {
    let app = setup_test_app(Arc::new(InMemoryTableStore::new()));
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = json_response(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["table"], TABLE);
}

#[tokio::test]
async fn test_empty_store_returns_404_document() {
    let app = setup_test_app(Arc::new(InMemoryTableStore::new()));
    let (status, document) = json_response(&app, invoke_request(&agent_envelope())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(document["messageVersion"], "1.0");
    assert_eq!(document["response"]["httpStatusCode"], 404);
    assert_eq!(document["response"]["actionGroup"], "transactions-action");
    assert_eq!(
        body_of(&document),
        json!({"error": "No transactions data found in the database."})
    );
    assert_eq!(document["sessionAttributes"], json!({"clientId": "c-42"}));
}

#[tokio::test]
async fn test_agent_call_returns_all_records() {
    let app = setup_test_app(Arc::new(InMemoryTableStore::with_items(TABLE, records(3))));
    let (status, document) = json_response(&app, invoke_request(&agent_envelope())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(document["response"]["httpStatusCode"], 200);
    assert_eq!(document["response"]["apiPath"], "/transactions");
    assert_eq!(document["response"]["httpMethod"], "GET");
    assert_eq!(body_of(&document), Value::Array(records(3)));
    assert_eq!(document["sessionAttributes"], json!({"clientId": "c-42"}));
    assert_eq!(
        document["promptSessionAttributes"],
        json!({"financialYear": "2024"})
    );
}

#[tokio::test]
async fn test_direct_call_gets_simplified_document() {
    let app = setup_test_app(Arc::new(InMemoryTableStore::with_items(TABLE, records(2))));
    let (status, document) = json_response(&app, invoke_request(&json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(document["response"]["httpStatusCode"], 200);
    assert_eq!(document["response"]["actionGroup"], "");
    assert_eq!(document["response"]["apiPath"], "");
    assert_eq!(document["response"]["httpMethod"], "");
    assert_eq!(document["sessionAttributes"], json!({}));
    assert_eq!(
        body_of(&document),
        json!({
            "message": "Successfully retrieved transactions data",
            "data": records(2),
            "count": 2
        })
    );
}

#[tokio::test]
async fn test_agent_field_alone_is_a_direct_call() {
    let app = setup_test_app(Arc::new(InMemoryTableStore::with_items(TABLE, records(1))));
    let (_, document) =
        json_response(&app, invoke_request(&json!({"agent": {"id": "AGENT1"}}))).await;

    assert_eq!(body_of(&document)["count"], 1);
}

#[tokio::test]
async fn test_sqlite_store_serves_invocations() {
    let store = SqliteTableStore::connect("sqlite::memory:").await.unwrap();
    for record in records(3) {
        store.insert(TABLE, &record).await.unwrap();
    }
    store
        .insert("clients", &json!({"id": "not a transaction"}))
        .await
        .unwrap();

    let app = setup_test_app(Arc::new(store));
    let (status, document) = json_response(&app, invoke_request(&agent_envelope())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_of(&document), Value::Array(records(3)));
}

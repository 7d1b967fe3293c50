//! End-to-end tests for the call registry
//!
//! Tests for `/v1/engagements/{id}/calls*` endpoints.

mod common;

use common::{
    TestClient, TestServer, CALL_1_STARTED_AT, EXTERNAL_CALL_1, EXTERNAL_CALL_2,
    EXTERNAL_CALL_NO_TRANSCRIPT,
};
use serde_json::{json, Value};

fn call_id(calls: &[(String, String)], external_id: &str) -> String {
    calls
        .iter()
        .find(|(ext, _)| ext == external_id)
        .map(|(_, id)| id.clone())
        .unwrap()
}

#[tokio::test]
async fn test_search_upserts_calls_once() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let id = client.create_test_engagement().await;

    let first = client.discover_calls(&id).await;
    assert_eq!(first.len(), 3);
    let second = client.discover_calls(&id).await;
    assert_eq!(first.len(), second.len());
    for (external_id, internal_id) in &first {
        assert_eq!(&call_id(&second, external_id), internal_id);
    }

    let response = client.list_calls(&id).await;
    assert_eq!(response.status(), 200);
    let calls: Vec<Value> = response.json().await.unwrap();
    assert_eq!(calls.len(), 3);
    // Newest first
    assert_eq!(calls[0]["external_id"], EXTERNAL_CALL_2);
    assert_eq!(calls[2]["external_id"], EXTERNAL_CALL_1);
    assert_eq!(calls[2]["started_at"], CALL_1_STARTED_AT);
    assert_eq!(calls[0]["selected_for_analysis"], false);
    assert!(calls[0]["transcript"].is_null());

    assert_eq!(
        server.provider.searched_domains.lock().unwrap().as_slice(),
        ["acme.com", "acme.com"]
    );
}

#[tokio::test]
async fn test_search_with_explicit_domain_and_range() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let response = client.create_engagement("No Domain Inc", None).await;
    let engagement: Value = response.json().await.unwrap();
    let id = engagement["id"].as_str().unwrap();

    let response = client.search_calls(id, json!({})).await;
    assert_eq!(response.status(), 400);

    let response = client
        .search_calls(id, json!({ "domain": "acme.com", "from": "2024-06-05" }))
        .await;
    assert_eq!(response.status(), 200);
    let calls: Vec<Value> = response.json().await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["external_id"], EXTERNAL_CALL_2);
}

#[tokio::test]
async fn test_fetch_transcript_attaches_text() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let id = client.create_test_engagement().await;
    let calls = client.discover_calls(&id).await;
    let call = call_id(&calls, EXTERNAL_CALL_1);

    let response = client.fetch_transcript(&id, &call).await;
    assert_eq!(response.status(), 200);
    let fetched: Value = response.json().await.unwrap();
    assert!(fetched["transcript"]
        .as_str()
        .unwrap()
        .starts_with("[Speaker A]: Reporting is all manual."));
    assert!(fetched["transcript_fetched_at"].is_i64());

    // Re-fetching is fine
    let response = client.fetch_transcript(&id, &call).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_fetch_missing_transcript_is_a_provider_error() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let id = client.create_test_engagement().await;
    let calls = client.discover_calls(&id).await;
    let call = call_id(&calls, EXTERNAL_CALL_NO_TRANSCRIPT);

    let response = client.fetch_transcript(&id, &call).await;
    assert_eq!(response.status(), 502);

    let calls: Vec<Value> = client.list_calls(&id).await.json().await.unwrap();
    let stored = calls
        .iter()
        .find(|c| c["external_id"] == EXTERNAL_CALL_NO_TRANSCRIPT)
        .unwrap();
    assert!(stored["transcript"].is_null());
}

#[tokio::test]
async fn test_select_and_deselect_call() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let id = client.create_test_engagement().await;
    let calls = client.discover_calls(&id).await;
    let call = call_id(&calls, EXTERNAL_CALL_2);

    let response = client.select_call(&id, &call, true).await;
    assert_eq!(response.status(), 200);
    let selected: Value = response.json().await.unwrap();
    assert_eq!(selected["selected_for_analysis"], true);

    let response = client.select_call(&id, &call, false).await;
    let deselected: Value = response.json().await.unwrap();
    assert_eq!(deselected["selected_for_analysis"], false);
}

#[tokio::test]
async fn test_call_of_another_engagement_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let first = client.create_test_engagement().await;
    let second = client.create_test_engagement().await;
    let calls = client.discover_calls(&first).await;
    let call = call_id(&calls, EXTERNAL_CALL_1);

    assert_eq!(client.select_call(&second, &call, true).await.status(), 404);
    assert_eq!(client.fetch_transcript(&second, &call).await.status(), 404);
    assert_eq!(client.select_call(&first, "missing", true).await.status(), 404);
}

//! Integration tests for the transport bridge.
//!
//! These tests drive the default stack (person + counter) end to end through
//! `handle`, `handle_http`, `spawn` and the typed client.

use std::collections::HashSet;
use std::sync::Arc;

use assert_json_diff::assert_json_eq;
use bytes::Bytes;
use gqlstack::config::StackConfig;
use gqlstack::registry::Lifetime;
use gqlstack::services::{
    COUNTER, CountProvider, InMemoryCounter, PERSON, Person, PersonProvider, StaticPersonProvider,
};
use gqlstack::{ClientError, GqlStack, TransportBridge};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

// =============================================================================
// Helpers
// =============================================================================

/// Builds the stack with a counter the test keeps a handle to, the way a
/// test harness injects a pre-built instance.
fn stack_with_counter(start: i32) -> (GqlStack, Arc<InMemoryCounter>) {
    let counter = Arc::new(InMemoryCounter::new(start));
    let injected = counter.clone();
    let stack = GqlStack::new(StackConfig::default(), move |registry| {
        registry
            .register_instance(COUNTER.name(), injected as Arc<dyn CountProvider>)?
            .register(PERSON.name(), Lifetime::Scoped, || {
                Arc::new(StaticPersonProvider) as Arc<dyn PersonProvider>
            })?;
        Ok(())
    })
    .unwrap();
    (stack, counter)
}

fn add_body(count: i32) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "query": "mutation Add($count: Int!) { add(count: $count) }",
        "variables": {"count": count},
        "operationName": "Add"
    }))
    .unwrap()
}

async fn post(bridge: &TransportBridge, body: Value) -> (StatusCode, Value) {
    let response = bridge.handle(&serde_json::to_vec(&body).unwrap()).await;
    let json = response.json().unwrap();
    (response.status, json)
}

// =============================================================================
// Successful requests
// =============================================================================

#[tokio::test]
async fn test_person_query() {
    let (stack, _) = stack_with_counter(0);
    let (status, body) = post(
        stack.bridge(),
        json!({"query": "{ person { firstName lastName } }"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_json_eq!(
        body,
        json!({"data": {"person": {"firstName": "Mike", "lastName": "Gaffney"}}})
    );
}

#[tokio::test]
async fn test_person_query_is_idempotent() {
    let (stack, _) = stack_with_counter(0);
    let query = json!({"query": "query P { person { lastName firstName } }", "variables": null});

    let (_, first) = post(stack.bridge(), query.clone()).await;
    let (_, second) = post(stack.bridge(), query).await;

    assert_eq!(first, second);
    assert!(first.get("errors").is_none());
}

#[tokio::test]
async fn test_response_keys_follow_document_order() {
    let (stack, _) = stack_with_counter(0);
    let response = stack
        .bridge()
        .handle(br#"{"query": "{ person { lastName first: firstName __typename } kind: __typename }"}"#)
        .await;

    assert_eq!(
        std::str::from_utf8(&response.body).unwrap(),
        r#"{"data":{"person":{"lastName":"Gaffney","first":"Mike","__typename":"Person"},"kind":"Query"}}"#
    );
}

#[tokio::test]
async fn test_singleton_accumulates_across_calls() {
    let (stack, counter) = stack_with_counter(10);

    let first = stack.bridge().handle(&add_body(3)).await;
    assert_json_eq!(first.json().unwrap(), json!({"data": {"add": 13}}));

    let second = stack.bridge().handle(&add_body(3)).await;
    assert_json_eq!(second.json().unwrap(), json!({"data": {"add": 16}}));

    assert_eq!(counter.current(), 16);
}

#[tokio::test]
async fn test_with_defaults_uses_configured_start() {
    let mut config = StackConfig::default();
    config.services.counter_start = 40;
    let stack = GqlStack::with_defaults(config).unwrap();

    let response = stack.bridge().handle(&add_body(2)).await;
    assert_json_eq!(response.json().unwrap(), json!({"data": {"add": 42}}));
}

#[tokio::test]
async fn test_mutation_fields_run_in_document_order() {
    let (stack, _) = stack_with_counter(0);
    let (_, body) = post(
        stack.bridge(),
        json!({"query": "mutation { a: add(count: 1) b: add(count: 2) c: add(count: 3) }"}),
    )
    .await;

    assert_json_eq!(body, json!({"data": {"a": 1, "b": 3, "c": 6}}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_lose_no_updates() {
    const CALLS: i32 = 64;
    let (stack, counter) = stack_with_counter(0);

    let handles: Vec<_> = (0..CALLS)
        .map(|_| stack.bridge().spawn(add_body(1)))
        .collect();

    let mut totals = HashSet::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        let total = response.json().unwrap()["data"]["add"].as_i64().unwrap();
        assert!(totals.insert(total), "total {total} observed twice");
    }

    assert_eq!(counter.current(), CALLS);
    assert_eq!(totals, (1..=i64::from(CALLS)).collect::<HashSet<_>>());
}

#[tokio::test]
async fn test_overflow_is_a_field_error() {
    let (stack, counter) = stack_with_counter(i32::MAX);
    let (status, body) = post(stack.bridge(), json!({"query": "mutation { add(count: 1) }"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"][0]["path"], json!(["add"]));
    assert_eq!(counter.current(), i32::MAX);
}

// =============================================================================
// Transport failures
// =============================================================================

#[tokio::test]
async fn test_missing_query_is_transport_error() {
    let (stack, _) = stack_with_counter(0);
    let (status, body) = post(stack.bridge(), json!({"variables": {}})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_eq!(
        body,
        json!({"errors": [{
            "message": "Request is missing the 'query' string",
            "extensions": {"code": "MISSING_QUERY"}
        }]})
    );
}

#[tokio::test]
async fn test_garbage_body_is_transport_error() {
    let (stack, _) = stack_with_counter(0);
    for body in [&b"\xff\xfe"[..], &b""[..], &b"[]"[..], &b"{\"query\": "[..]] {
        let response = stack.bridge().handle(body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(response.json().unwrap()["errors"][0]["message"].is_string());
    }
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = StackConfig::default();
    config.transport.max_body_bytes = 16;
    let stack = GqlStack::with_defaults(config).unwrap();

    let response = stack
        .bridge()
        .handle(br#"{"query": "{ person { firstName } }"}"#)
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        response.json().unwrap()["errors"][0]["extensions"]["code"],
        "PAYLOAD_TOO_LARGE"
    );
}

#[tokio::test]
async fn test_parse_error_is_document_level() {
    let (stack, _) = stack_with_counter(0);
    let (status, body) = post(stack.bridge(), json!({"query": "{ person { "})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("data").is_none());
    assert_eq!(body["errors"][0]["extensions"]["code"], "GRAPHQL_PARSE_FAILED");
    assert!(body["errors"][0]["locations"].is_array());
}

#[tokio::test]
async fn test_unknown_field_fails_validation() {
    let (stack, _) = stack_with_counter(0);
    let (status, body) = post(stack.bridge(), json!({"query": "{ person { middleName } }"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("data").is_none());
    assert_eq!(
        body["errors"][0]["message"],
        "Unknown field \"middleName\" on type \"Person\""
    );
}

// =============================================================================
// HTTP shape
// =============================================================================

fn http_request(method: &str, uri: &str, body: &'static [u8]) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::from_static(body))
        .unwrap()
}

#[tokio::test]
async fn test_http_post() {
    let (stack, _) = stack_with_counter(0);
    let response = stack
        .bridge()
        .handle_http(http_request(
            "POST",
            "/graphql",
            br#"{"query": "{ person { firstName } }"}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[http::header::CONTENT_TYPE],
        "application/json"
    );
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_json_eq!(body, json!({"data": {"person": {"firstName": "Mike"}}}));
}

#[tokio::test]
async fn test_http_get_matches_post() {
    let (stack, _) = stack_with_counter(0);
    let response = stack
        .bridge()
        .handle_http(http_request(
            "GET",
            "/graphql?query=%7B%20person%20%7B%20lastName%20%7D%20%7D",
            b"",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_json_eq!(body, json!({"data": {"person": {"lastName": "Gaffney"}}}));
}

#[tokio::test]
async fn test_http_get_without_query() {
    let (stack, _) = stack_with_counter(0);
    let response = stack
        .bridge()
        .handle_http(http_request("GET", "/graphql", b""))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_put_not_allowed() {
    let (stack, _) = stack_with_counter(0);
    let response = stack
        .bridge()
        .handle_http(http_request("PUT", "/graphql", b"{}"))
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[http::header::ALLOW], "GET, POST");
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["errors"][0]["extensions"]["code"], "METHOD_NOT_ALLOWED");
}

// =============================================================================
// Typed client
// =============================================================================

#[derive(Debug, Deserialize)]
struct PersonData {
    person: Person,
}

#[derive(Debug, Deserialize)]
struct AddData {
    add: i32,
}

#[tokio::test]
async fn test_client_decodes_typed_data() {
    let (stack, _) = stack_with_counter(5);
    let client = stack.client();

    let person = client
        .execute::<PersonData, _>("{ person { firstName lastName } }", ())
        .await
        .unwrap();
    assert!(person.is_ok());
    assert_eq!(person.data.unwrap().person, StaticPersonProvider.person());

    let added = client
        .execute::<AddData, _>(
            "mutation Add($count: Int!) { add(count: $count) }",
            json!({"count": 4}),
        )
        .await
        .unwrap();
    assert_eq!(added.into_result().unwrap().unwrap().add, 9);
}

#[tokio::test]
async fn test_client_selects_operation() {
    let (stack, _) = stack_with_counter(0);
    let response = stack
        .client()
        .execute_operation::<AddData, _>(
            "query P { person { firstName } } mutation A { add(count: 7) }",
            Some("A"),
            (),
        )
        .await
        .unwrap();
    assert_eq!(response.data.unwrap().add, 7);
}

#[tokio::test]
async fn test_client_surfaces_errors() {
    let (stack, _) = stack_with_counter(0);
    let response = stack
        .client()
        .execute::<AddData, _>("mutation { add(count: \"x\") }", ())
        .await
        .unwrap();

    assert!(response.data.is_none());
    let errors = response.into_result().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "Invalid value for argument \"count\", expected type \"Int!\""
    );
}

#[tokio::test]
async fn test_client_request_respects_body_limit() {
    let mut config = StackConfig::default();
    config.transport.max_body_bytes = 32;
    let stack = GqlStack::with_defaults(config).unwrap();

    let err = stack
        .client()
        .execute::<PersonData, _>("{ person { firstName lastName } }", ())
        .await
        .unwrap_err();

    match err {
        ClientError::Rejected { status, message } => {
            assert_eq!(status, 413);
            assert!(message.contains("exceeds limit of 32 bytes"), "{message}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

//! Integration tests for panel request dispatch
//!
//! Requests are built from the JSON a panel would send, so these also pin
//! the wire shape of requests and responses.

use serde_json::{json, Value};

use super::common::{chunk_blocks, Harness};
use panel_relay::{BridgeRequest, BridgeResponse};

fn request(value: Value) -> BridgeRequest {
    serde_json::from_value(value).expect("valid bridge request")
}

/// Test that ping is answered with the caller's id
#[tokio::test]
async fn test_ping_echoes_id() {
    let harness = Harness::new();
    let panel = harness.panel("p1");

    let response = harness
        .bridge
        .handle(&panel.session, request(json!({"id": "req-7", "type": "panel:ping"})))
        .await;

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"id": "req-7", "type": "panel:ping", "success": true, "data": {"pong": true}})
    );
}

/// Test that unknown request types are refused by name
#[tokio::test]
async fn test_unsupported_type() {
    let harness = Harness::new();
    let panel = harness.panel("p1");

    let response = harness
        .bridge
        .handle(&panel.session, request(json!({"id": 3, "type": "api:files:list"})))
        .await;

    assert_eq!(
        response,
        BridgeResponse {
            id: json!(3),
            kind: "api:files:list".to_string(),
            success: false,
            data: json!({"error": "Unsupported message type: api:files:list"}),
        }
    );
}

/// Test that a malformed payload fails the request without side effects
#[tokio::test]
async fn test_invalid_start_payload() {
    let harness = Harness::new();
    let panel = harness.panel("p1");

    let response = harness
        .bridge
        .handle(
            &panel.session,
            request(json!({"id": 1, "type": "api:sse:start", "payload": {"path": 5}})),
        )
        .await;

    assert!(!response.success);
    let error = response.data["error"].as_str().unwrap();
    assert!(error.starts_with("Invalid payload"), "unexpected error: {error}");
    assert!(harness.upstream.requests().is_empty());
}

/// Test a full start, relay and stop round through the bridge
#[tokio::test]
async fn test_start_relay_stop() {
    let harness = Harness::new();
    let feed = harness.upstream.stream("/event");
    let mut panel = harness.panel("p1");

    // No payload means the default `/event` path.
    let started = harness
        .bridge
        .handle(&panel.session, request(json!({"id": 1, "type": "api:sse:start"})))
        .await;
    assert!(started.success);
    assert_eq!(started.data["status"], 200);
    assert!(started.data.get("error").is_none());
    let stream_id = started.data["streamId"].as_str().unwrap().to_string();
    assert!(stream_id.starts_with("sse-"));

    feed.send("data: {\"type\":\"server.connected\"}\n\n");
    let chunk = panel.next_message().await;
    assert_eq!(chunk["payload"]["streamId"], stream_id.as_str());
    assert_eq!(
        chunk_blocks(&chunk),
        vec!["data: {\"type\":\"server.connected\"}"]
    );

    let stopped = harness
        .bridge
        .handle(
            &panel.session,
            request(json!({"id": 2, "type": "api:sse:stop", "payload": {"streamId": stream_id}})),
        )
        .await;
    assert_eq!(stopped.data, json!({"stopped": true}));
    assert!(panel.session.active_streams().is_empty());
}

/// Test that start failures are reported in the response data
#[tokio::test]
async fn test_start_unavailable_reports_status() {
    let harness = Harness::disconnected();
    let panel = harness.panel("p1");

    let response = harness
        .bridge
        .handle(
            &panel.session,
            request(json!({"id": 9, "type": "api:sse:start", "payload": {"path": "/event"}})),
        )
        .await;

    assert!(response.success);
    assert_eq!(
        response.data,
        json!({
            "status": 503,
            "headers": {},
            "streamId": null,
            "error": "OpenCode API unavailable"
        })
    );
}

/// Test that stop without a stream id still acknowledges
#[tokio::test]
async fn test_stop_without_stream_id() {
    let harness = Harness::new();
    let panel = harness.panel("p1");

    let response = harness
        .bridge
        .handle(&panel.session, request(json!({"id": 4, "type": "api:sse:stop"})))
        .await;

    assert!(response.success);
    assert_eq!(response.data, json!({"stopped": true}));
}

/// Test that stop acknowledges malformed stream ids instead of failing
#[tokio::test]
async fn test_stop_with_malformed_stream_id() {
    let harness = Harness::new();
    let _feed = harness.upstream.stream("/event");
    let panel = harness.panel("p1");
    harness.start_ok(&panel, "/event").await;

    for payload in [json!({"streamId": 42}), json!({"streamId": null}), json!("sse-1-1")] {
        let response = harness
            .bridge
            .handle(
                &panel.session,
                request(json!({"id": 9, "type": "api:sse:stop", "payload": payload})),
            )
            .await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"id": 9, "type": "api:sse:stop", "success": true, "data": {"stopped": true}})
        );
    }

    // Nothing was named, so the running stream is untouched.
    assert_eq!(panel.session.active_streams().len(), 1);
    harness.registry.dispose("p1");
}

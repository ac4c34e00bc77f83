//! Integration tests for the process-wide session activity monitor

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::common::{Harness, Reply, TestPanel};
use panel_relay::monitor::{ActivityMonitor, MonitorConfig};
use panel_relay::ActivityPhase;

const BUSY: &str = r#"data: {"directory":"/work/repo","payload":{"type":"session.status","properties":{"sessionID":"s1","status":{"type":"busy"}}}}"#;
const FINISHED: &str = r#"data: {"directory":"/work/repo","payload":{"type":"message.updated","properties":{"info":{"sessionID":"s1","role":"assistant","finish":"stop"}}}}"#;

fn monitor_for(harness: &Harness) -> Arc<ActivityMonitor> {
    Arc::new(ActivityMonitor::new(
        harness.connection.clone(),
        harness.upstream.clone(),
        harness.registry.clone(),
        MonitorConfig::default(),
    ))
}

async fn next_phase(panel: &mut TestPanel) -> (String, String) {
    let message = panel.next_message().await;
    assert_eq!(message["type"], "session:activity", "unexpected: {message}");
    (
        message["payload"]["sessionId"].as_str().unwrap().to_string(),
        message["payload"]["phase"].as_str().unwrap().to_string(),
    )
}

/// Test that phase changes on the global feed reach every panel once
#[tokio::test]
async fn test_monitor_broadcasts_phase_changes() {
    let harness = Harness::new();
    let feed = harness.upstream.stream("/global/event");
    let mut first = harness.panel("p1");
    let mut second = harness.panel("p2");
    let shutdown = CancellationToken::new();
    let monitor = monitor_for(&harness);
    let task = monitor.clone().spawn(shutdown.clone());

    feed.send(&format!("{BUSY}\n\n{BUSY}\n\n"));
    assert_eq!(next_phase(&mut first).await, ("s1".into(), "busy".into()));
    assert_eq!(
        second.next_message().await,
        json!({"type": "session:activity", "payload": {"sessionId": "s1", "phase": "busy"}})
    );
    assert_eq!(monitor.phases().phase("s1"), Some(ActivityPhase::Busy));

    feed.send("data: {\"type\":\"session.idle\",\"properties\":{\"sessionID\":\"s1\"}}\n\n");
    // The repeated busy was not re-announced.
    assert_eq!(next_phase(&mut first).await, ("s1".into(), "idle".into()));

    shutdown.cancel();
    task.await.unwrap();
    assert_eq!(harness.upstream.requested_paths(), vec!["/global/event"]);
}

/// Test that the monitor falls back to the directory-scoped feed
#[tokio::test]
async fn test_monitor_falls_back_to_directory_feed() {
    let harness = Harness::new();
    harness.upstream.reply("/global/event", Reply::Status(404));
    harness
        .upstream
        .reply("/event", Reply::Fail("connection refused".to_string()));
    let feed = harness.upstream.stream("/event?directory=%2Fwork%2Frepo");
    let mut panel = harness.panel("p1");
    let shutdown = CancellationToken::new();
    let task = monitor_for(&harness).spawn(shutdown.clone());

    let part = r#"data: {"type":"message.part.updated","properties":{"info":{"sessionID":"s2","role":"assistant"},"part":{"type":"text"}}}"#;
    feed.send(&format!("{part}\n\n"));
    assert_eq!(next_phase(&mut panel).await, ("s2".into(), "busy".into()));

    shutdown.cancel();
    task.await.unwrap();
    assert_eq!(
        harness.upstream.requested_paths(),
        vec!["/global/event", "/event", "/event?directory=%2Fwork%2Frepo"]
    );
    let requests = harness.upstream.requests();
    assert_eq!(requests[0].headers["Accept"], "text/event-stream");
}

/// Test that a finished reply cools down and then settles to idle
#[tokio::test(start_paused = true)]
async fn test_monitor_cooldown_expires_to_idle() {
    let harness = Harness::new();
    let feed = harness.upstream.stream("/global/event");
    let mut panel = harness.panel("p1");
    let shutdown = CancellationToken::new();
    let monitor = monitor_for(&harness);
    let task = monitor.clone().spawn(shutdown.clone());

    feed.send(&format!("{BUSY}\n\n{FINISHED}\n\n"));
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "busy".into()));
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "cooldown".into()));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "idle".into()));
    assert_eq!(monitor.phases().phase("s1"), Some(ActivityPhase::Idle));

    shutdown.cancel();
    task.await.unwrap();
}

/// Test that a finished reply for an idle session is ignored
#[tokio::test]
async fn test_monitor_ignores_cooldown_when_not_busy() {
    let harness = Harness::new();
    let feed = harness.upstream.stream("/global/event");
    let mut panel = harness.panel("p1");
    let shutdown = CancellationToken::new();
    let task = monitor_for(&harness).spawn(shutdown.clone());

    feed.send(&format!("{FINISHED}\n\n{BUSY}\n\n"));
    // Only the busy transition is announced.
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "busy".into()));

    shutdown.cancel();
    task.await.unwrap();
    assert!(panel.drain().is_empty());
}

/// Test that a dropped feed resets known sessions to idle and reconnects
#[tokio::test(start_paused = true)]
async fn test_monitor_resets_and_reconnects() {
    let harness = Harness::new();
    let first = harness.upstream.stream("/global/event");
    let second = harness.upstream.stream("/global/event");
    let mut panel = harness.panel("p1");
    let shutdown = CancellationToken::new();
    let task = monitor_for(&harness).spawn(shutdown.clone());

    first.send(&format!("{BUSY}\n\n"));
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "busy".into()));

    first.close();
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "idle".into()));

    second.send(&format!("{BUSY}\n\n"));
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "busy".into()));
    assert_eq!(
        harness.upstream.requested_paths(),
        vec!["/global/event", "/global/event"]
    );

    shutdown.cancel();
    task.await.unwrap();
}

/// Test that the monitor idles until a backend is configured
#[tokio::test(start_paused = true)]
async fn test_monitor_waits_for_backend() {
    let harness = Harness::disconnected();
    let feed = harness.upstream.stream("/global/event");
    let mut panel = harness.panel("p1");
    let shutdown = CancellationToken::new();
    let task = monitor_for(&harness).spawn(shutdown.clone());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(harness.upstream.requests().is_empty());

    harness
        .connection
        .set_base_url(Some(super::common::BASE_URL));
    tokio::time::sleep(Duration::from_secs(3)).await;
    feed.send(&format!("{BUSY}\n\n"));
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "busy".into()));

    shutdown.cancel();
    task.await.unwrap();
}

/// Test that a finished reply is announced once, even when replayed
#[tokio::test]
async fn test_monitor_broadcasts_assistant_notification_once() {
    let harness = Harness::new();
    let feed = harness.upstream.stream("/global/event");
    let mut first = harness.panel("p1");
    let mut second = harness.panel("p2");
    let shutdown = CancellationToken::new();
    let task = monitor_for(&harness).spawn(shutdown.clone());

    let done = r#"data: {"directory":"/work/repo","payload":{"type":"message.updated","properties":{"info":{"id":"msg_1","sessionID":"s1","role":"assistant","finish":"stop","mode":"build","modelID":"claude-sonnet-4-5"}}}}"#;
    let asked = r#"data: {"type":"question.asked","properties":{"sessionID":"s1","id":"q1"}}"#;
    feed.send(&format!("{done}\n\n{done}\n\n{asked}\n\n{asked}\n\n"));

    let expected_ready = json!({
        "type": "assistant:notification",
        "payload": {
            "kind": "ready",
            "title": "Build agent is ready",
            "body": "Claude Sonnet 4.5 completed the task",
            "sessionId": "s1"
        }
    });
    let expected_input = json!({
        "type": "assistant:notification",
        "payload": {
            "kind": "input",
            "title": "Input needed",
            "body": "Agent is waiting for your response",
            "sessionId": "s1"
        }
    });
    assert_eq!(first.next_message().await, expected_ready);
    assert_eq!(first.next_message().await, expected_input);
    assert_eq!(second.next_message().await, expected_ready);
    assert_eq!(second.next_message().await, expected_input);

    shutdown.cancel();
    task.await.unwrap();
    // The session was never busy, so no phase change either.
    assert!(first.drain().is_empty());
}

/// Test that notifications can be switched off without stopping phases
#[tokio::test]
async fn test_monitor_notifications_disabled() {
    let harness = Harness::new();
    let feed = harness.upstream.stream("/global/event");
    let mut panel = harness.panel("p1");
    let shutdown = CancellationToken::new();
    let monitor = Arc::new(ActivityMonitor::new(
        harness.connection.clone(),
        harness.upstream.clone(),
        harness.registry.clone(),
        MonitorConfig {
            notifications: false,
            ..MonitorConfig::default()
        },
    ));
    let task = monitor.spawn(shutdown.clone());

    let done = r#"data: {"type":"message.updated","properties":{"info":{"id":"msg_1","sessionID":"s1","role":"assistant","finish":"stop"}}}"#;
    feed.send(&format!("{BUSY}\n\n{done}\n\n"));
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "busy".into()));
    assert_eq!(next_phase(&mut panel).await, ("s1".into(), "cooldown".into()));

    shutdown.cancel();
    task.await.unwrap();
    assert!(panel.drain().is_empty());
}

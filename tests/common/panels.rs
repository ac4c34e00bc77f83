//! Panel fixtures and a fully wired proxy around [`ScriptedUpstream`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use panel_relay::sse::SseStartRequest;
use panel_relay::{
    Bridge, ChannelSurface, PanelRegistry, PanelSession, SharedConnection, SseProxy,
    SseStartResponse, StreamId, StreamIdGenerator,
};

use super::upstream::{ScriptedUpstream, BASE_URL};

pub const WORKING_DIR: &str = "/work/repo";

/// A registered panel plus everything posted to it.
pub struct TestPanel {
    pub session: Arc<PanelSession>,
    rx: UnboundedReceiver<Value>,
}

impl TestPanel {
    pub fn open(registry: &PanelRegistry, id: &str) -> Self {
        let (surface, rx) = ChannelSurface::channel();
        let session = registry.open(id, Arc::new(surface));
        Self { session, rx }
    }

    /// Next posted message; panics if none arrives.
    pub async fn next_message(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for panel message")
            .expect("panel channel closed")
    }

    /// Everything posted so far.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

/// Let spawned relay tasks run until they block again.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Split an `api:sse:chunk` message into its blocks.
pub fn chunk_blocks(message: &Value) -> Vec<String> {
    assert_eq!(message["type"], "api:sse:chunk", "not a chunk: {message}");
    let chunk = message["payload"]["chunk"].as_str().expect("chunk text");
    assert!(chunk.ends_with("\n\n"), "chunk not terminated: {chunk:?}");
    chunk
        .trim_end_matches("\n\n")
        .split("\n\n")
        .map(str::to_string)
        .collect()
}

/// The raw JSON of a block's data line, without any unwrapping.
pub fn raw_data(block: &str) -> Value {
    let line = block
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .expect("block has a data line");
    serde_json::from_str(line.trim_start()).expect("data is JSON")
}

/// Proxy, bridge and registry sharing one scripted upstream.
pub struct Harness {
    pub upstream: Arc<ScriptedUpstream>,
    pub connection: Arc<SharedConnection>,
    pub registry: Arc<PanelRegistry>,
    pub proxy: Arc<SseProxy>,
    pub bridge: Bridge,
}

impl Harness {
    /// Connected to [`BASE_URL`] serving [`WORKING_DIR`].
    pub fn new() -> Self {
        Self::with_connection(Some(BASE_URL.to_string()))
    }

    pub fn disconnected() -> Self {
        Self::with_connection(None)
    }

    fn with_connection(base_url: Option<String>) -> Self {
        let upstream = ScriptedUpstream::new();
        let connection = Arc::new(SharedConnection::new(
            base_url,
            Some(PathBuf::from(WORKING_DIR)),
        ));
        let proxy = Arc::new(SseProxy::new(
            connection.clone(),
            upstream.clone(),
            Arc::new(StreamIdGenerator::new()),
        ));
        Self {
            upstream,
            connection,
            registry: Arc::new(PanelRegistry::new()),
            bridge: Bridge::new(proxy.clone()),
            proxy,
        }
    }

    pub fn panel(&self, id: &str) -> TestPanel {
        TestPanel::open(&self.registry, id)
    }

    pub async fn start(&self, panel: &TestPanel, path: &str) -> SseStartResponse {
        self.proxy
            .start(
                &panel.session,
                SseStartRequest {
                    path: Some(path.to_string()),
                    headers: None,
                },
            )
            .await
    }

    /// Start and insist the stream opened.
    pub async fn start_ok(&self, panel: &TestPanel, path: &str) -> StreamId {
        let response = self.start(panel, path).await;
        assert_eq!(response.status, 200, "start failed: {response:?}");
        response.stream_id.expect("stream id")
    }
}

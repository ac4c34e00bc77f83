//! Per-panel SSE relay: opens the upstream event stream, reframes it and
//! pushes complete blocks to the owning panel.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::activity::{activity_block, derive_activity};
use super::codec::{decode_block, frame_blocks, BlockBuffer, Utf8Decoder};
use super::heartbeat::{Heartbeat, HEARTBEAT_INTERVAL};
use super::scope::wrap_global_scope;
use super::stream_id::{StreamId, StreamIdGenerator};
use crate::bridge::OutboundMessage;
use crate::panel::PanelSession;
use crate::upstream::{BackendConnection, ByteStream, RelayError, UpstreamClient, UpstreamResponse};

pub const EVENT_PATH: &str = "/event";
pub const GLOBAL_EVENT_PATH: &str = "/global/event";

const UNAVAILABLE_STATUS: u16 = 503;
const BAD_GATEWAY_STATUS: u16 = 502;
const UNAVAILABLE_MESSAGE: &str = "OpenCode API unavailable";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseStartRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseStartResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub stream_id: Option<StreamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SseStartResponse {
    fn failed(status: u16, headers: BTreeMap<String, String>, error: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            stream_id: None,
            error: Some(error.into()),
        }
    }

    fn unavailable() -> Self {
        Self::failed(UNAVAILABLE_STATUS, BTreeMap::new(), UNAVAILABLE_MESSAGE)
    }

    fn bad_gateway(err: &RelayError) -> Self {
        Self::failed(BAD_GATEWAY_STATUS, BTreeMap::new(), err.to_string())
    }

    fn rejected(response: &UpstreamResponse) -> Self {
        let error = if response.is_success() {
            "SSE response has no body".to_string()
        } else {
            RelayError::Upstream {
                status: response.status,
            }
            .to_string()
        };
        Self::failed(response.status, response.headers.clone(), error)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseStopRequest {
    #[serde(default)]
    pub stream_id: Option<StreamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseStopResponse {
    pub stopped: bool,
}

/// Normalize a requested event path; blank means `/event`.
pub fn normalize_path(path: Option<&str>) -> String {
    match path.map(str::trim).filter(|p| !p.is_empty()) {
        None => EVENT_PATH.to_string(),
        Some(p) if p.starts_with('/') => p.to_string(),
        Some(p) => format!("/{p}"),
    }
}

/// Only the two session event feeds get activity blocks and heartbeats.
pub fn tracks_activity(path: &str) -> bool {
    path == EVENT_PATH || path == GLOBAL_EVENT_PATH
}

/// Fixed SSE headers overlaid by the caller's. Caller values win on a
/// case-insensitive name collision.
pub fn merge_headers(caller: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = [
        ("Accept", "text/event-stream"),
        ("Cache-Control", "no-cache"),
        ("Connection", "keep-alive"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect();

    for (name, value) in caller.into_iter().flatten() {
        merged.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        merged.insert(name.clone(), value.clone());
    }
    merged
}

/// Transforms applied to every batch of complete blocks.
#[derive(Debug, Clone, Default)]
struct BlockPipeline {
    /// Set in wrapped mode: directory for the global-scope envelope.
    wrap_directory: Option<String>,
    track_activity: bool,
}

impl BlockPipeline {
    /// Wrap, derive and frame a batch. `None` when there is nothing to send.
    fn render(&self, blocks: Vec<String>) -> Option<String> {
        if blocks.is_empty() {
            return None;
        }
        let blocks = match &self.wrap_directory {
            Some(directory) => wrap_global_scope(blocks, directory),
            None => blocks,
        };
        if !self.track_activity {
            return Some(frame_blocks(blocks));
        }

        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            let activity = derive_activity(decode_block(&block).as_ref());
            out.push(block);
            if let Some(activity) = activity {
                out.push(self.synthetic(activity_block(&activity)));
            }
        }
        Some(frame_blocks(out))
    }

    /// Synthetic blocks follow the stream's envelope so wrapped consumers
    /// see one shape.
    fn synthetic(&self, block: String) -> String {
        match &self.wrap_directory {
            Some(directory) => wrap_global_scope(vec![block], directory).remove(0),
            None => block,
        }
    }
}

/// Opens relays on behalf of panels.
pub struct SseProxy {
    connection: Arc<dyn BackendConnection>,
    upstream: Arc<dyn UpstreamClient>,
    ids: Arc<StreamIdGenerator>,
    heartbeat_interval: Duration,
}

impl SseProxy {
    pub fn new(
        connection: Arc<dyn BackendConnection>,
        upstream: Arc<dyn UpstreamClient>,
        ids: Arc<StreamIdGenerator>,
    ) -> Self {
        Self {
            connection,
            upstream,
            ids,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Handle `api:sse:start`. Every failure is folded into the response;
    /// on success the relay keeps running in its own task.
    pub async fn start(&self, panel: &Arc<PanelSession>, request: SseStartRequest) -> SseStartResponse {
        let Some(base_url) = self.connection.base_url() else {
            tracing::debug!(panel_id = %panel.id(), "SSE start without backend connection");
            return SseStartResponse::unavailable();
        };

        let path = normalize_path(request.path.as_deref());
        let track_activity = tracks_activity(&path);
        let headers = merge_headers(request.headers.as_ref());

        let (response, wrapped) = match self.open_with_fallback(&base_url, &path, &headers).await {
            Ok(opened) => opened,
            Err(err) => {
                tracing::warn!(panel_id = %panel.id(), %path, error = %err, "SSE upstream connect failed");
                return SseStartResponse::bad_gateway(&err);
            }
        };

        if !response.is_streamable() {
            tracing::warn!(panel_id = %panel.id(), %path, status = response.status, "SSE upstream rejected");
            return SseStartResponse::rejected(&response);
        }
        let UpstreamResponse {
            status,
            headers: response_headers,
            body,
        } = response;
        let Some(body) = body else {
            return SseStartResponse::failed(status, response_headers, "SSE response has no body");
        };

        let stream_id = self.ids.next_id();
        let cancel = CancellationToken::new();
        if !panel.register_stream(stream_id.clone(), cancel.clone()) {
            cancel.cancel();
            return SseStartResponse::failed(UNAVAILABLE_STATUS, BTreeMap::new(), "Panel disposed");
        }

        let pipeline = BlockPipeline {
            wrap_directory: wrapped.then(|| self.fallback_directory()),
            track_activity,
        };

        if track_activity {
            let heartbeat = self.spawn_heartbeat(panel, &stream_id, &cancel, pipeline.clone());
            panel.register_heartbeat(stream_id.clone(), heartbeat);
        }

        tracing::info!(
            panel_id = %panel.id(),
            stream_id = %stream_id,
            %path,
            wrapped,
            track_activity,
            "SSE stream started"
        );

        let relay = RelayTask {
            panel: panel.clone(),
            stream_id: stream_id.clone(),
            cancel,
            pipeline,
        };
        tokio::spawn(relay.run(body));

        SseStartResponse {
            status,
            headers: response_headers,
            stream_id: Some(stream_id),
            error: None,
        }
    }

    /// Handle `api:sse:stop`. Always acknowledges.
    pub fn stop(&self, panel: &PanelSession, request: SseStopRequest) -> SseStopResponse {
        if let Some(stream_id) = request.stream_id {
            if panel.cancel_stream(&stream_id) {
                tracing::info!(panel_id = %panel.id(), stream_id = %stream_id, "SSE stream stopped");
            } else {
                tracing::debug!(panel_id = %panel.id(), stream_id = %stream_id, "Stop for unknown SSE stream");
            }
        }
        SseStopResponse { stopped: true }
    }

    /// Open `path`; a failed `/global/event` is retried once on `/event`,
    /// in which case the stream is relayed in wrapped mode.
    async fn open_with_fallback(
        &self,
        base_url: &str,
        path: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<(UpstreamResponse, bool), RelayError> {
        let response = self
            .upstream
            .open(&format!("{base_url}{path}"), headers)
            .await?;
        if path != GLOBAL_EVENT_PATH || response.is_streamable() {
            return Ok((response, false));
        }

        tracing::debug!(
            status = response.status,
            "Global event endpoint unavailable; falling back to {EVENT_PATH}"
        );
        let fallback = self
            .upstream
            .open(&format!("{base_url}{EVENT_PATH}"), headers)
            .await?;
        let wrapped = fallback.is_streamable();
        Ok((fallback, wrapped))
    }

    fn fallback_directory(&self) -> String {
        self.connection
            .working_directory()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn spawn_heartbeat(
        &self,
        panel: &Arc<PanelSession>,
        stream_id: &StreamId,
        cancel: &CancellationToken,
        pipeline: BlockPipeline,
    ) -> Heartbeat {
        let panel: Weak<PanelSession> = Arc::downgrade(panel);
        let stream_id = stream_id.clone();
        // Heartbeats go out as their own chunk, never through the residual
        // buffer.
        Heartbeat::spawn(self.heartbeat_interval, cancel, move |block| {
            if let Some(panel) = panel.upgrade() {
                panel.post(&OutboundMessage::SseChunk {
                    stream_id: stream_id.clone(),
                    chunk: frame_blocks([pipeline.synthetic(block)]),
                });
            }
        })
    }
}

/// Releases the stream's registry entries on every exit path.
struct StreamCleanup {
    panel: Arc<PanelSession>,
    stream_id: StreamId,
}

impl Drop for StreamCleanup {
    fn drop(&mut self) {
        self.panel.release_stream(&self.stream_id);
    }
}

struct RelayTask {
    panel: Arc<PanelSession>,
    stream_id: StreamId,
    cancel: CancellationToken,
    pipeline: BlockPipeline,
}

impl RelayTask {
    async fn run(self, mut body: ByteStream) {
        let _cleanup = StreamCleanup {
            panel: self.panel.clone(),
            stream_id: self.stream_id.clone(),
        };
        let mut decoder = Utf8Decoder::new();
        let mut buffer = BlockBuffer::new(self.pipeline.track_activity);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = body.next() => Some(next),
            };
            // Explicit cancellation ends the relay silently.
            let Some(next) = next.filter(|_| !self.cancel.is_cancelled()) else {
                tracing::debug!(stream_id = %self.stream_id, "SSE stream cancelled");
                return;
            };

            match next {
                Some(Ok(bytes)) => {
                    let text = decoder.decode(&bytes);
                    self.send_blocks(buffer.push(&text));
                }
                Some(Err(err)) => {
                    tracing::warn!(stream_id = %self.stream_id, error = %err, "SSE upstream read failed");
                    self.panel.post(&OutboundMessage::SseEnd {
                        stream_id: self.stream_id.clone(),
                        error: Some(err.to_string()),
                    });
                    return;
                }
                None => {
                    let mut blocks = buffer.push(&decoder.finish());
                    blocks.extend(buffer.finish());
                    self.send_blocks(blocks);
                    self.panel.post(&OutboundMessage::SseEnd {
                        stream_id: self.stream_id.clone(),
                        error: None,
                    });
                    tracing::info!(stream_id = %self.stream_id, "SSE stream completed");
                    return;
                }
            }
        }
    }

    fn send_blocks(&self, blocks: Vec<String>) {
        if let Some(chunk) = self.pipeline.render(blocks) {
            self.panel.post(&OutboundMessage::SseChunk {
                stream_id: self.stream_id.clone(),
                chunk,
            });
        }
    }
}

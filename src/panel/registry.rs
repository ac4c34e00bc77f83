//! Panel sessions and the resources they own.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::surface::PanelSurface;
use crate::bridge::OutboundMessage;
use crate::sse::{Heartbeat, StreamId};

/// One visible panel: its surface plus every stream and heartbeat timer
/// started on its behalf.
pub struct PanelSession {
    id: String,
    surface: Arc<dyn PanelSurface>,
    streams: Mutex<HashMap<StreamId, CancellationToken>>,
    heartbeats: Mutex<HashMap<StreamId, Heartbeat>>,
    disposed: CancellationToken,
}

impl PanelSession {
    pub fn new(id: impl Into<String>, surface: Arc<dyn PanelSurface>) -> Self {
        Self {
            id: id.into(),
            surface,
            streams: Mutex::new(HashMap::new()),
            heartbeats: Mutex::new(HashMap::new()),
            disposed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }

    /// Resolves once the panel has been disposed.
    pub async fn disposed(&self) {
        self.disposed.cancelled().await
    }

    /// Post a typed message. Dropped silently after disposal.
    pub fn post(&self, message: &OutboundMessage) -> bool {
        self.post_serialized(message)
    }

    /// Post any serializable value, e.g. a bridge response.
    pub fn post_serialized<T: Serialize>(&self, message: &T) -> bool {
        if self.is_disposed() {
            return false;
        }
        match serde_json::to_value(message) {
            Ok(value) => self.post_value(value),
            Err(e) => {
                tracing::error!(panel_id = %self.id, error = %e, "Failed to serialize panel message");
                false
            }
        }
    }

    fn post_value(&self, value: Value) -> bool {
        !self.is_disposed() && self.surface.post_message(value)
    }

    /// Track a newly opened stream. Returns false, leaving the token
    /// untracked, when the panel is already gone.
    pub fn register_stream(&self, stream_id: StreamId, cancel: CancellationToken) -> bool {
        let mut streams = self.streams.lock();
        if self.is_disposed() {
            return false;
        }
        streams.insert(stream_id, cancel);
        true
    }

    pub fn register_heartbeat(&self, stream_id: StreamId, heartbeat: Heartbeat) {
        let mut heartbeats = self.heartbeats.lock();
        if self.is_disposed() {
            heartbeat.stop();
            return;
        }
        if let Some(previous) = heartbeats.insert(stream_id, heartbeat) {
            previous.stop();
        }
    }

    /// Explicit stop: cancel the stream's handle and drop its timer.
    /// Returns whether an active stream matched.
    pub fn cancel_stream(&self, stream_id: &StreamId) -> bool {
        let token = self.streams.lock().remove(stream_id);
        let found = match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };
        self.stop_heartbeat(stream_id);
        found
    }

    /// Completion cleanup: forget the stream and stop its timer without
    /// signalling cancellation.
    pub fn release_stream(&self, stream_id: &StreamId) {
        self.streams.lock().remove(stream_id);
        self.stop_heartbeat(stream_id);
    }

    fn stop_heartbeat(&self, stream_id: &StreamId) {
        if let Some(heartbeat) = self.heartbeats.lock().remove(stream_id) {
            heartbeat.stop();
        }
    }

    pub fn active_streams(&self) -> Vec<StreamId> {
        self.streams.lock().keys().cloned().collect()
    }

    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.lock().len()
    }

    /// Cancel every owned stream and clear every timer. Idempotent.
    pub fn dispose(&self) {
        self.disposed.cancel();

        let streams: Vec<(StreamId, CancellationToken)> = self.streams.lock().drain().collect();
        for (_, token) in &streams {
            token.cancel();
        }
        let heartbeats: Vec<(StreamId, Heartbeat)> = self.heartbeats.lock().drain().collect();
        let timer_count = heartbeats.len();
        for (_, heartbeat) in heartbeats {
            heartbeat.stop();
        }

        tracing::debug!(
            panel_id = %self.id,
            streams = streams.len(),
            timers = timer_count,
            "Panel disposed"
        );
    }
}

impl std::fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSession")
            .field("id", &self.id)
            .field("streams", &self.streams.lock().len())
            .field("heartbeats", &self.heartbeats.lock().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Live panels keyed by panel id.
#[derive(Default)]
pub struct PanelRegistry {
    panels: Mutex<HashMap<String, Arc<PanelSession>>>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a panel. Reusing a live id disposes the previous panel.
    pub fn open(&self, id: impl Into<String>, surface: Arc<dyn PanelSurface>) -> Arc<PanelSession> {
        let panel = Arc::new(PanelSession::new(id, surface));
        let previous = self
            .panels
            .lock()
            .insert(panel.id().to_string(), panel.clone());
        if let Some(previous) = previous {
            tracing::warn!(panel_id = %panel.id(), "Replacing live panel with same id");
            previous.dispose();
        }
        tracing::info!(panel_id = %panel.id(), "Panel opened");
        panel
    }

    pub fn get(&self, id: &str) -> Option<Arc<PanelSession>> {
        self.panels.lock().get(id).cloned()
    }

    /// Tear down a panel and every resource it owns.
    pub fn dispose(&self, id: &str) -> bool {
        let removed = self.panels.lock().remove(id);
        match removed {
            Some(panel) => {
                panel.dispose();
                tracing::info!(panel_id = %id, "Panel closed");
                true
            }
            None => false,
        }
    }

    pub fn dispose_all(&self) {
        let panels: Vec<Arc<PanelSession>> =
            self.panels.lock().drain().map(|(_, panel)| panel).collect();
        for panel in panels {
            panel.dispose();
        }
    }

    /// Deliver the same message to every live panel. Returns how many
    /// accepted it.
    pub fn broadcast(&self, message: &OutboundMessage) -> usize {
        self.snapshot()
            .iter()
            .filter(|panel| panel.post(message))
            .count()
    }

    pub fn panel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.panels.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.panels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.lock().is_empty()
    }

    pub fn total_streams(&self) -> usize {
        self.snapshot()
            .iter()
            .map(|panel| panel.active_streams().len())
            .sum()
    }

    fn snapshot(&self) -> Vec<Arc<PanelSession>> {
        self.panels.lock().values().cloned().collect()
    }
}

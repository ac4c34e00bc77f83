//! Process-wide session activity monitor.
//!
//! Listens to the backend's event feed independently of any panel, keeps the
//! last known phase per session and broadcasts phase changes to every panel.
//! The same feed drives assistant notifications.

mod notifications;
mod phases;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::OutboundMessage;
use crate::panel::PanelRegistry;
use crate::sse::activity::{message_info, session_id_of};
use crate::sse::proxy::{EVENT_PATH, GLOBAL_EVENT_PATH};
use crate::sse::{
    decode_block, derive_activity, ActivityPhase, BlockBuffer, Payload, SessionActivity,
    Utf8Decoder,
};
use crate::upstream::{BackendConnection, ByteStream, RelayError, UpstreamClient};

pub use notifications::{
    format_mode, format_model_id, AssistantNotification, NotificationKind, NotificationTracker,
};
pub use phases::PhaseBook;

/// Assistant part types that mean a reply is streaming.
const STREAMING_PART_TYPES: &[&str] = &["step-start", "text", "tool", "reasoning", "file", "patch"];

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub reconnect_delay: Duration,
    pub cooldown: Duration,
    /// Broadcast `assistant:notification` for finished replies and questions.
    pub notifications: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
            cooldown: Duration::from_secs(2),
            notifications: true,
        }
    }
}

/// Which feed the monitor ended up on.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FeedScope {
    Global,
    Directory(PathBuf),
}

/// What one decoded event asks the phase book to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PhaseSignal {
    Set(SessionActivity),
    CooldownIfBusy(String),
}

pub struct ActivityMonitor {
    connection: Arc<dyn BackendConnection>,
    upstream: Arc<dyn UpstreamClient>,
    registry: Arc<PanelRegistry>,
    book: Arc<PhaseBook>,
    notifications: NotificationTracker,
    config: MonitorConfig,
}

impl ActivityMonitor {
    pub fn new(
        connection: Arc<dyn BackendConnection>,
        upstream: Arc<dyn UpstreamClient>,
        registry: Arc<PanelRegistry>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            connection,
            upstream,
            book: Arc::new(PhaseBook::new(registry.clone(), config.cooldown)),
            registry,
            notifications: NotificationTracker::new(),
            config,
        }
    }

    pub fn phases(&self) -> &Arc<PhaseBook> {
        &self.book
    }

    /// Run until `shutdown` fires, reconnecting after every disconnect.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                // Phases may be stale after a disconnect; start from idle.
                self.book.reset_all();

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    result = self.run_once() => {
                        if let Err(error) = result {
                            tracing::warn!(error = %error, "Activity feed error");
                        }
                    }
                }

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                }
            }
            self.book.clear_timers();
            tracing::info!("Activity monitor stopped");
        })
    }

    async fn run_once(&self) -> Result<(), RelayError> {
        let Some(base_url) = self.connection.base_url() else {
            tracing::debug!("Backend unavailable; activity monitor waiting");
            return Ok(());
        };

        let (mut body, scope) = self.connect(&base_url).await?;
        let mut decoder = Utf8Decoder::new();
        let mut buffer = BlockBuffer::new(true);

        loop {
            let next = match tokio::time::timeout(self.config.reconnect_delay, body.next()).await {
                Ok(next) => next,
                Err(_) => {
                    // Quiet feed: follow the working directory if it moved.
                    if let FeedScope::Directory(connected) = &scope {
                        if self.connection.working_directory().as_ref() != Some(connected) {
                            tracing::debug!(
                                from = %connected.display(),
                                "Working directory changed; reconnecting activity feed"
                            );
                            return Ok(());
                        }
                    }
                    continue;
                }
            };

            match next {
                Some(Ok(bytes)) => {
                    for block in buffer.push(&decoder.decode(&bytes)) {
                        self.apply(decode_block(&block).as_ref());
                    }
                }
                Some(Err(error)) => return Err(error),
                None => {
                    tracing::debug!("Activity feed ended");
                    return Ok(());
                }
            }
        }
    }

    /// Try the global feed, then `/event`, then `/event?directory=`.
    async fn connect(&self, base_url: &str) -> Result<(ByteStream, FeedScope), RelayError> {
        let headers = BTreeMap::from([
            ("Accept".to_string(), "text/event-stream".to_string()),
            ("Accept-Encoding".to_string(), "identity".to_string()),
        ]);

        for path in [GLOBAL_EVENT_PATH, EVENT_PATH] {
            let url = format!("{base_url}{path}");
            match self.upstream.open(&url, &headers).await {
                Ok(response) if response.is_streamable() => {
                    if let Some(body) = response.body {
                        tracing::debug!(%url, "Activity feed connected");
                        return Ok((body, FeedScope::Global));
                    }
                }
                Ok(response) => {
                    tracing::debug!(%url, status = response.status, "Activity feed endpoint unavailable");
                }
                Err(error) => {
                    tracing::debug!(%url, error = %error, "Activity feed endpoint unavailable");
                }
            }
        }

        let directory = self.connection.working_directory().unwrap_or_default();
        let mut url = reqwest::Url::parse(&format!("{base_url}{EVENT_PATH}"))
            .map_err(|e| RelayError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("directory", &directory.to_string_lossy());

        let response = self.upstream.open(url.as_str(), &headers).await?;
        if !response.is_success() {
            return Err(RelayError::Upstream {
                status: response.status,
            });
        }
        let body = response
            .body
            .ok_or_else(|| RelayError::Stream("SSE response has no body".to_string()))?;
        tracing::debug!(%url, "Activity feed connected (directory scope)");
        Ok((body, FeedScope::Directory(directory)))
    }

    fn apply(&self, payload: Option<&Payload>) {
        for signal in phase_signals(payload) {
            match signal {
                PhaseSignal::Set(activity) => {
                    self.book.set_phase(&activity.session_id, activity.phase);
                }
                PhaseSignal::CooldownIfBusy(session_id) => {
                    self.book.enter_cooldown_if_busy(&session_id);
                }
            }
        }

        if !self.config.notifications {
            return;
        }
        if let Some(notification) = payload.and_then(|p| self.notifications.observe(p)) {
            tracing::debug!(
                kind = ?notification.kind,
                session_id = ?notification.session_id,
                "Assistant notification"
            );
            self.registry
                .broadcast(&OutboundMessage::AssistantNotification(notification));
        }
    }
}

fn phase_signals(payload: Option<&Payload>) -> Vec<PhaseSignal> {
    let Some(payload) = payload else {
        return Vec::new();
    };

    if payload.get("type").and_then(Value::as_str) == Some("message.part.updated") {
        return part_update_signals(payload);
    }

    match derive_activity(Some(payload)) {
        Some(activity) if activity.phase == ActivityPhase::Cooldown => {
            vec![PhaseSignal::CooldownIfBusy(activity.session_id)]
        }
        Some(activity) => vec![PhaseSignal::Set(activity)],
        None => Vec::new(),
    }
}

/// Streaming assistant parts mark the session busy even when the server
/// never sends `session.status`.
fn part_update_signals(payload: &Payload) -> Vec<PhaseSignal> {
    let Some(info) = message_info(payload) else {
        return Vec::new();
    };
    if info.get("role").and_then(Value::as_str) != Some("assistant") {
        return Vec::new();
    }
    let Some(session_id) = session_id_of(Some(info)) else {
        return Vec::new();
    };

    let mut signals = Vec::new();
    let part_type = payload
        .get("properties")
        .and_then(|properties| properties.get("part"))
        .and_then(|part| part.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if STREAMING_PART_TYPES.contains(&part_type) {
        signals.push(PhaseSignal::Set(SessionActivity::new(
            session_id.clone(),
            ActivityPhase::Busy,
        )));
    }
    if info.get("finish").and_then(Value::as_str) == Some("stop") {
        signals.push(PhaseSignal::CooldownIfBusy(session_id));
    }
    signals
}

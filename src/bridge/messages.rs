//! Wire messages exchanged between a panel and the relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::monitor::AssistantNotification;
use crate::sse::{SessionActivity, StreamId};

pub const SSE_START: &str = "api:sse:start";
pub const SSE_STOP: &str = "api:sse:stop";
pub const PANEL_PING: &str = "panel:ping";

/// Control request from a panel, answered by exactly one [`BridgeResponse`].
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeRequest {
    /// Correlation id chosen by the panel, echoed back verbatim.
    pub id: Value,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    pub data: Value,
}

impl BridgeResponse {
    pub fn ok(request: &BridgeRequest, data: Value) -> Self {
        Self {
            id: request.id.clone(),
            kind: request.kind.clone(),
            success: true,
            data,
        }
    }

    pub fn failed(request: &BridgeRequest, error: impl Into<String>) -> Self {
        Self {
            id: request.id.clone(),
            kind: request.kind.clone(),
            success: false,
            data: serde_json::json!({ "error": error.into() }),
        }
    }
}

/// Unsolicited message pushed to a panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum OutboundMessage {
    /// One or more complete, terminated SSE blocks.
    #[serde(rename = "api:sse:chunk", rename_all = "camelCase")]
    SseChunk { stream_id: StreamId, chunk: String },

    /// Terminal notification for a stream.
    #[serde(rename = "api:sse:end", rename_all = "camelCase")]
    SseEnd {
        stream_id: StreamId,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "panel:ready", rename_all = "camelCase")]
    PanelReady { panel_id: String },

    #[serde(rename = "theme:changed")]
    ThemeChanged(Value),

    #[serde(rename = "connection:status", rename_all = "camelCase")]
    ConnectionStatus {
        connected: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },

    #[serde(rename = "session:activity")]
    SessionActivity(SessionActivity),

    #[serde(rename = "assistant:notification")]
    AssistantNotification(AssistantNotification),

    /// Frame that could not be understood.
    #[serde(rename = "error")]
    Error { message: String },
}

impl OutboundMessage {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            message: message.into(),
        }
    }
}

//! Routes panel control requests to their handlers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::messages::{BridgeRequest, BridgeResponse, PANEL_PING, SSE_START, SSE_STOP};
use crate::panel::PanelSession;
use crate::sse::{SseProxy, SseStartRequest, SseStopRequest, StreamId};

pub struct Bridge {
    proxy: Arc<SseProxy>,
}

impl Bridge {
    pub fn new(proxy: Arc<SseProxy>) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &Arc<SseProxy> {
        &self.proxy
    }

    /// Answer one request. Never fails: problems become `success: false`.
    pub async fn handle(&self, panel: &Arc<PanelSession>, request: BridgeRequest) -> BridgeResponse {
        tracing::trace!(panel_id = %panel.id(), kind = %request.kind, "Bridge request");

        match request.kind.as_str() {
            SSE_START => match parse_payload::<SseStartRequest>(&request.payload) {
                Ok(start) => {
                    let response = self.proxy.start(panel, start).await;
                    respond(&request, &response)
                }
                Err(error) => BridgeResponse::failed(&request, error),
            },
            SSE_STOP => {
                let response = self.proxy.stop(panel, stop_request(&request.payload));
                respond(&request, &response)
            }
            PANEL_PING => BridgeResponse::ok(&request, json!({ "pong": true })),
            other => {
                tracing::debug!(panel_id = %panel.id(), kind = %other, "Unsupported bridge request");
                BridgeResponse::failed(&request, format!("Unsupported message type: {other}"))
            }
        }
    }
}

/// Stop always acknowledges, so a payload without a usable string
/// `streamId` simply names no stream.
fn stop_request(payload: &Value) -> SseStopRequest {
    SseStopRequest {
        stream_id: payload
            .get("streamId")
            .and_then(Value::as_str)
            .map(StreamId::from_string),
    }
}

/// Null payloads mean "all defaults".
fn parse_payload<T: DeserializeOwned + Default>(payload: &Value) -> Result<T, String> {
    if payload.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(payload.clone()).map_err(|e| format!("Invalid payload: {e}"))
}

fn respond<T: Serialize>(request: &BridgeRequest, data: &T) -> BridgeResponse {
    match serde_json::to_value(data) {
        Ok(data) => BridgeResponse::ok(request, data),
        Err(e) => BridgeResponse::failed(request, format!("Failed to encode response: {e}")),
    }
}

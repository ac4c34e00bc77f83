//! WebSocket connection handler: one socket is one panel.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bridge::{BridgeRequest, OutboundMessage};
use crate::core::RelayCore;
use crate::panel::ChannelSurface;

/// Serve one panel until its socket closes, then dispose it.
pub async fn handle_websocket(socket: WebSocket, core: Arc<RelayCore>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to the WebSocket
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

    // Spawn task to forward messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let panel_id = Uuid::new_v4().to_string();
    let registry = core.registry().clone();
    let panel = registry.open(panel_id.clone(), Arc::new(ChannelSurface::new(tx)));
    panel.post(&OutboundMessage::PanelReady {
        panel_id: panel_id.clone(),
    });

    // Handle incoming messages
    while let Some(result) = ws_receiver.next().await {
        let msg = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) => {
                // Pings are handled automatically by axum
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(panel_id = %panel_id, error = %e, "WebSocket error");
                break;
            }
        };

        let request: BridgeRequest = match serde_json::from_str(msg.as_str()) {
            Ok(request) => request,
            Err(e) => {
                panel.post(&OutboundMessage::error(format!("Invalid message: {}", e)));
                continue;
            }
        };

        // Requests run concurrently so a slow upstream connect never blocks
        // a stop for another stream.
        let bridge = core.bridge().clone();
        let panel = panel.clone();
        tokio::spawn(async move {
            let response = bridge.handle(&panel, request).await;
            panel.post_serialized(&response);
        });
    }

    registry.dispose(&panel_id);
    send_task.abort();
}

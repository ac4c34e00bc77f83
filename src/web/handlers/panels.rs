//! Panel inspection and broadcast handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::OutboundMessage;
use crate::upstream::BackendConnection;
use crate::web::error::WebError;
use crate::web::state::WebAppState;

/// Live panels and their active stream count.
#[derive(Debug, Serialize)]
pub struct ListPanelsResponse {
    pub panels: Vec<String>,
    pub streams: usize,
}

pub async fn list_panels(State(state): State<WebAppState>) -> Json<ListPanelsResponse> {
    let registry = state.core().registry();
    Json(ListPanelsResponse {
        panels: registry.panel_ids(),
        streams: registry.total_streams(),
    })
}

/// How many panels a broadcast reached.
#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub delivered: usize,
}

/// Broadcast a theme change. The body is relayed as-is but must name a
/// `kind`.
pub async fn set_theme(
    State(state): State<WebAppState>,
    Json(theme): Json<Value>,
) -> Result<Json<BroadcastResponse>, WebError> {
    let has_kind = theme
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|kind| !kind.trim().is_empty());
    if !has_kind {
        return Err(WebError::BadRequest("theme kind is required".to_string()));
    }

    let delivered = state
        .core()
        .registry()
        .broadcast(&OutboundMessage::ThemeChanged(theme));
    tracing::debug!(delivered, "Theme change broadcast");
    Ok(Json(BroadcastResponse { delivered }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConnectionRequest {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub connected: bool,
    pub base_url: Option<String>,
    pub directory: Option<String>,
    pub delivered: usize,
}

/// Point the relay at a (new) backend and tell every panel.
pub async fn update_connection(
    State(state): State<WebAppState>,
    Json(request): Json<UpdateConnectionRequest>,
) -> Result<Json<ConnectionResponse>, WebError> {
    if let Some(url) = request.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        reqwest::Url::parse(url.trim())
            .map_err(|e| WebError::BadRequest(format!("invalid baseUrl: {e}")))?;
    }

    let core = state.core();
    if let Some(directory) = request.directory {
        let directory = directory.trim();
        core.connection()
            .set_working_directory((!directory.is_empty()).then(|| directory.into()));
    }
    // An absent baseUrl keeps the current backend; an empty one disconnects.
    let delivered = match request.base_url.as_deref() {
        Some(url) => core.update_connection(Some(url)),
        None => core.broadcast_connection_status(),
    };

    let connection = core.connection();
    Ok(Json(ConnectionResponse {
        connected: connection.is_connected(),
        base_url: connection.base_url(),
        directory: connection
            .working_directory()
            .map(|dir| dir.display().to_string()),
        delivered,
    }))
}

/// Streams owned by a single panel.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDetailResponse {
    pub id: String,
    pub streams: Vec<String>,
    pub heartbeats: usize,
}

pub async fn get_panel(
    State(state): State<WebAppState>,
    Path(id): Path<String>,
) -> Result<Json<PanelDetailResponse>, WebError> {
    let panel = state
        .core()
        .registry()
        .get(&id)
        .ok_or_else(|| WebError::NotFound(format!("Panel {id} not found")))?;

    let mut streams: Vec<String> = panel
        .active_streams()
        .into_iter()
        .map(|stream_id| stream_id.to_string())
        .collect();
    streams.sort();

    Ok(Json(PanelDetailResponse {
        id: panel.id().to_string(),
        streams,
        heartbeats: panel.heartbeat_count(),
    }))
}

//! Session activity derived from relayed events.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::codec::{encode_block, Payload, SYNTHETIC_EVENT_NAME};

/// Payload `type` of synthesized activity blocks.
pub const ACTIVITY_EVENT_TYPE: &str = "openchamber:session-activity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityPhase {
    Idle,
    Busy,
    Cooldown,
}

impl ActivityPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityPhase::Idle => "idle",
            ActivityPhase::Busy => "busy",
            ActivityPhase::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for ActivityPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionActivity {
    pub session_id: String,
    pub phase: ActivityPhase,
}

impl SessionActivity {
    pub fn new(session_id: impl Into<String>, phase: ActivityPhase) -> Self {
        Self {
            session_id: session_id.into(),
            phase,
        }
    }
}

/// Work out whether a decoded event implies a liveness transition.
///
/// All-or-nothing: a missing or mistyped field anywhere yields `None`.
pub fn derive_activity(payload: Option<&Payload>) -> Option<SessionActivity> {
    let payload = payload?;
    let properties = payload.get("properties");

    match payload.get("type")?.as_str()? {
        "session.status" => {
            let status = properties?.get("status")?.get("type")?.as_str()?;
            let session_id = session_id_of(properties)?;
            let phase = if matches!(status, "busy" | "retry") {
                ActivityPhase::Busy
            } else {
                ActivityPhase::Idle
            };
            Some(SessionActivity::new(session_id, phase))
        }
        "message.updated" | "message.complete" => {
            let info = message_info(payload)?;
            if info.get("role")?.as_str()? != "assistant" {
                return None;
            }
            if info.get("finish")?.as_str()? != "stop" {
                return None;
            }
            let session_id = session_id_of(Some(info)).or_else(|| session_id_of(properties))?;
            Some(SessionActivity::new(session_id, ActivityPhase::Cooldown))
        }
        "session.idle" => Some(SessionActivity::new(
            session_id_of(properties)?,
            ActivityPhase::Idle,
        )),
        _ => None,
    }
}

/// Synthetic block announcing `activity`, unterminated.
pub fn activity_block(activity: &SessionActivity) -> String {
    encode_block(
        SYNTHETIC_EVENT_NAME,
        &json!({
            "type": ACTIVITY_EVENT_TYPE,
            "properties": activity,
        }),
    )
}

/// Message info lives under `properties.info` on current servers and at
/// the top level on older ones.
pub(crate) fn message_info(payload: &Payload) -> Option<&Value> {
    payload
        .get("properties")
        .and_then(|properties| properties.get("info"))
        .filter(|info| info.is_object())
        .or_else(|| payload.get("info").filter(|info| info.is_object()))
}

/// `sessionID`, falling back to `sessionId` only when the first is absent
/// or null. Must be a non-empty string.
pub(crate) fn session_id_of(value: Option<&Value>) -> Option<String> {
    let value = value?;
    let raw = value
        .get("sessionID")
        .filter(|id| !id.is_null())
        .or_else(|| value.get("sessionId"))?;
    raw.as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

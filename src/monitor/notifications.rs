//! Assistant notifications: a finished reply or a pending question, each
//! announced once per process.

use std::collections::HashSet;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::sse::activity::session_id_of;
use crate::sse::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// An assistant reply finished.
    Ready,
    /// The agent asked the user a question.
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Remembers what was already announced. The sets outlive reconnects, so a
/// replayed event after a dropped feed stays silent.
#[derive(Default)]
pub struct NotificationTracker {
    messages: Mutex<HashSet<String>>,
    questions: Mutex<HashSet<String>>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The notification this event calls for, if it has not been seen.
    pub fn observe(&self, payload: &Payload) -> Option<AssistantNotification> {
        let properties = payload.get("properties")?;
        match payload.get("type").and_then(Value::as_str)? {
            "message.updated" => self.message_finished(properties),
            "question.asked" => self.question_asked(properties),
            _ => None,
        }
    }

    fn message_finished(&self, properties: &Value) -> Option<AssistantNotification> {
        let info = properties.get("info")?;
        if info.get("role").and_then(Value::as_str) != Some("assistant")
            || info.get("finish").and_then(Value::as_str) != Some("stop")
        {
            return None;
        }
        let message_id = info.get("id").and_then(Value::as_str)?;
        if !self.messages.lock().insert(message_id.to_string()) {
            return None;
        }

        let mode = non_empty(info, "mode").unwrap_or("agent");
        let model = non_empty(info, "modelID").unwrap_or("assistant");
        Some(AssistantNotification {
            kind: NotificationKind::Ready,
            title: format!("{} agent is ready", format_mode(mode)),
            body: format!("{} completed the task", format_model_id(model)),
            session_id: session_id_of(Some(info)),
        })
    }

    fn question_asked(&self, properties: &Value) -> Option<AssistantNotification> {
        let session_id = properties.get("sessionID").and_then(Value::as_str)?;
        let question_id = properties.get("id").and_then(Value::as_str)?;
        if !self
            .questions
            .lock()
            .insert(format!("{session_id}:{question_id}"))
        {
            return None;
        }

        Some(AssistantNotification {
            kind: NotificationKind::Input,
            title: "Input needed".to_string(),
            body: "Agent is waiting for your response".to_string(),
            session_id: Some(session_id.to_string()),
        })
    }
}

fn non_empty<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// `plan_mode` -> `Plan Mode`.
pub fn format_mode(raw: &str) -> String {
    if raw.is_empty() {
        return "Agent".to_string();
    }
    raw.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `claude-sonnet-4-5` -> `Claude Sonnet 4.5`. Two adjacent numeric tokens
/// read as one version number.
pub fn format_model_id(raw: &str) -> String {
    if raw.is_empty() {
        return "Assistant".to_string();
    }

    let is_number = |token: &str| token.chars().all(|c| c.is_ascii_digit());
    let tokens: Vec<&str> = raw.split(['-', '_']).collect();
    let mut words = Vec::with_capacity(tokens.len());
    let mut index = 0;
    while index < tokens.len() {
        let current = tokens[index];
        match tokens.get(index + 1) {
            Some(next) if is_number(current) && is_number(next) => {
                words.push(format!("{current}.{next}"));
                index += 2;
            }
            _ => {
                words.push(capitalize(current));
                index += 1;
            }
        }
    }
    words.join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

//! SSE block framing: decoding `data:` payloads and splitting raw text
//! into complete blocks.

use serde_json::{Map, Value};

/// Blank line terminating every block.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Prefix of a data field line.
pub const DATA_PREFIX: &str = "data:";

/// Event name used for blocks the relay synthesizes itself.
pub const SYNTHETIC_EVENT_NAME: &str = "message";

/// Loosely typed decoded payload. Upstream shapes vary by protocol version,
/// so fields are read with total lookups rather than a schema.
pub type Payload = Map<String, Value>;

/// Decode the JSON object carried by a block's data lines.
///
/// A `payload` object nested in the top level is unwrapped one level, so
/// directory-enveloped and plain events decode to the same shape. Anything
/// malformed yields `None`.
pub fn decode_block(block: &str) -> Option<Payload> {
    let data_lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if data_lines.is_empty() {
        return None;
    }

    let joined = data_lines.join("\n");
    let text = joined.trim();
    if text.is_empty() {
        return None;
    }

    let Value::Object(mut object) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };

    match object.remove("payload") {
        Some(Value::Object(inner)) => Some(inner),
        Some(other) => {
            object.insert("payload".to_string(), other);
            Some(object)
        }
        None => Some(object),
    }
}

/// Build an unterminated block with one event line and one data line.
pub fn encode_block(event: &str, data: &Value) -> String {
    format!("event: {event}\n{DATA_PREFIX} {data}")
}

/// Join blocks into one outbound chunk, each followed by the separator.
pub fn frame_blocks<I, S>(blocks: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    blocks.into_iter().fold(String::new(), |mut out, block| {
        out.push_str(block.as_ref());
        out.push_str(BLOCK_SEPARATOR);
        out
    })
}

/// Incremental UTF-8 decoder that holds back split multi-byte sequences.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus held-back bytes) as forms complete
    /// characters. Invalid sequences become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            let (valid, invalid_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(err) => (err.valid_up_to(), err.error_len()),
            };
            if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                out.push_str(text);
            }
            match invalid_len {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + len);
                }
                None => {
                    self.pending.drain(..valid);
                    break;
                }
            }
        }

        out
    }

    /// Flush at end of stream; a dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Residual buffer that cuts decoded text into complete blocks.
#[derive(Debug, Default)]
pub struct BlockBuffer {
    residual: String,
    normalize_newlines: bool,
    pending_cr: bool,
}

impl BlockBuffer {
    /// With `normalize_newlines`, CRLF is folded to LF before buffering.
    pub fn new(normalize_newlines: bool) -> Self {
        Self {
            normalize_newlines,
            ..Self::default()
        }
    }

    /// Append text and return every block completed by it, in order.
    /// The trailing incomplete fragment stays buffered.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        if self.normalize_newlines {
            let mut chunk = String::with_capacity(text.len() + 1);
            if std::mem::take(&mut self.pending_cr) {
                chunk.push('\r');
            }
            chunk.push_str(text);
            // A CR at the edge may pair with an LF in the next read.
            if chunk.ends_with('\r') {
                chunk.pop();
                self.pending_cr = true;
            }
            self.residual.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.residual.push_str(text);
        }

        let mut blocks = Vec::new();
        while let Some(idx) = self.residual.find(BLOCK_SEPARATOR) {
            blocks.push(self.residual[..idx].to_string());
            self.residual.drain(..idx + BLOCK_SEPARATOR.len());
        }
        blocks
    }

    /// Take the remaining fragment at end of stream. Any non-empty
    /// residual is returned, whitespace included.
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.pending_cr) {
            self.residual.push('\r');
        }
        let rest = std::mem::take(&mut self.residual);
        (!rest.is_empty()).then_some(rest)
    }

    pub fn residual(&self) -> &str {
        &self.residual
    }
}

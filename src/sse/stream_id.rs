//! Stream identifiers for proxied SSE relays.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-unique handle naming one relay instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic id generator. Owned explicitly and shared by the proxy so
/// tests can start from a known counter.
#[derive(Debug, Default)]
pub struct StreamIdGenerator {
    counter: AtomicU64,
}

impl StreamIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator whose next id carries `start + 1`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Mint `sse-<epoch ms>-<counter>`.
    pub fn next_id(&self) -> StreamId {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = chrono::Utc::now().timestamp_millis();
        StreamId(format!("sse-{millis}-{count}"))
    }
}

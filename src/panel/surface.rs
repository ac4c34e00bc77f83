//! Display surface a panel posts messages to.

use serde_json::Value;
use tokio::sync::mpsc;

/// The panel's host-side sink. `post_message` takes arbitrary JSON and
/// reports whether the surface is still accepting messages.
pub trait PanelSurface: Send + Sync {
    fn post_message(&self, message: Value) -> bool;
}

/// Surface backed by an unbounded channel, drained by the socket writer.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<Value>,
}

impl ChannelSurface {
    pub fn new(tx: mpsc::UnboundedSender<Value>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PanelSurface for ChannelSurface {
    fn post_message(&self, message: Value) -> bool {
        self.tx.send(message).is_ok()
    }
}

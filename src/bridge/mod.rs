//! Message bridge between panels and the relay.

mod dispatch;
pub mod messages;

pub use dispatch::Bridge;
pub use messages::{BridgeRequest, BridgeResponse, OutboundMessage};

//! Server-sent event relay: framing, derived liveness signals and the
//! per-panel proxy.

pub mod activity;
pub mod codec;
pub mod heartbeat;
pub mod proxy;
pub mod scope;
mod stream_id;

pub use activity::{derive_activity, ActivityPhase, SessionActivity};
pub use codec::{decode_block, BlockBuffer, Payload, Utf8Decoder};
pub use heartbeat::{Heartbeat, HEARTBEAT_INTERVAL};
pub use proxy::{SseProxy, SseStartRequest, SseStartResponse, SseStopRequest, SseStopResponse};
pub use scope::wrap_global_scope;
pub use stream_id::{StreamId, StreamIdGenerator};

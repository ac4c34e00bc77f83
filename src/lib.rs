pub mod bridge;
pub mod config;
pub mod core;
pub mod monitor;
pub mod panel;
pub mod sse;
pub mod upstream;
pub mod util;
pub mod web;

pub use bridge::{Bridge, BridgeRequest, BridgeResponse, OutboundMessage};
pub use config::Config;
pub use crate::core::RelayCore;
pub use monitor::{ActivityMonitor, AssistantNotification};
pub use panel::{ChannelSurface, PanelRegistry, PanelSession, PanelSurface};
pub use sse::{
    ActivityPhase, SessionActivity, SseProxy, SseStartRequest, SseStartResponse, SseStopRequest,
    SseStopResponse, StreamId, StreamIdGenerator,
};
pub use upstream::{BackendConnection, HttpUpstream, RelayError, SharedConnection, UpstreamClient};

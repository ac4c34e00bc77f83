//! Upstream side of the relay: backend connection and streaming HTTP client.

mod connection;
mod error;
mod http;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use connection::{BackendConnection, SharedConnection};
pub use error::RelayError;
pub use http::HttpUpstream;

/// Incrementally delivered response body.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, RelayError>>;

/// Response headers plus an optional streaming body.
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<ByteStream>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// OK status and a body to read from.
    pub fn is_streamable(&self) -> bool {
        self.is_success() && self.body.is_some()
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// HTTP client able to open a streaming GET against the backend.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Issue the request and return once response headers arrive.
    async fn open(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<UpstreamResponse, RelayError>;
}

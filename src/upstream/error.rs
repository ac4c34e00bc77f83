//! Errors raised while talking to the upstream OpenCode API.

/// Failure reaching or reading from the upstream event stream.
///
/// These never cross the panel boundary as errors: the proxy turns every
/// variant into a structured start response or a terminal `end` message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Connect or transport failure. Displays the raw failure text.
    #[error("{0}")]
    Network(String),

    /// Upstream answered with a non-success status.
    #[error("SSE request failed with status {status}")]
    Upstream { status: u16 },

    /// Upstream URL or header could not be built.
    #[error("Invalid upstream request: {0}")]
    InvalidUrl(String),

    /// Failure while reading an already-open body.
    #[error("Stream error: {0}")]
    Stream(String),
}

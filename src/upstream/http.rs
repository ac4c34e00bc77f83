//! reqwest-backed upstream client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use super::{RelayError, UpstreamClient, UpstreamResponse};

/// Idle SSE streams can stay open for hours; only the overall request
/// lifetime is capped.
const SSE_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
const SSE_TCP_KEEPALIVE: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new() -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(SSE_REQUEST_TIMEOUT)
            .tcp_keepalive(Some(SSE_TCP_KEEPALIVE))
            .build()
            .map_err(|err| RelayError::Network(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, RelayError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| RelayError::InvalidUrl(format!("header {name}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| RelayError::InvalidUrl(format!("header {name}: {err}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn open(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<UpstreamResponse, RelayError> {
        tracing::debug!(%url, "Connecting upstream SSE");

        let response = self
            .client
            .get(url)
            .headers(to_header_map(headers)?)
            .send()
            .await
            .map_err(|err| RelayError::Network(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(%url, status, "Upstream SSE response");

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|err| RelayError::Stream(err.to_string()))
            })
            .boxed();

        Ok(UpstreamResponse {
            status,
            headers,
            body: Some(body),
        })
    }
}

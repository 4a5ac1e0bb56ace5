use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use pingora::{ErrorType::InternalError, OrErr, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use crate::{
    config::{Timeout, Upstream},
    error::{BridgeError, BridgeResult},
    jsonrpc::JSONRPCRequest,
    service::constants::{ACCEPT_JSON_AND_SSE, MCP_SESSION_ID},
};

/// Raw byte stream of a relayed upstream response.
pub type ByteStream = Pin<Box<dyn Stream<Item = BridgeResult<Bytes>> + Send>>;

/// A fully buffered 2xx reply from the remote endpoint.
#[derive(Debug, Clone, Default)]
pub struct UpstreamReply {
    pub status: u16,
    pub session_token: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// A 2xx reply whose body is still arriving.
pub struct UpstreamStream {
    pub status: u16,
    pub session_token: Option<String>,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

/// Outbound side of the bridge: posts JSON-RPC requests to the remote endpoint.
///
/// Non-2xx replies are returned as [`BridgeError::Upstream`].
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(
        &self,
        request: &JSONRPCRequest,
        session_token: Option<&str>,
    ) -> BridgeResult<UpstreamReply>;

    async fn open_stream(
        &self,
        request: &JSONRPCRequest,
        session_token: Option<&str>,
    ) -> BridgeResult<UpstreamStream>;
}

/// reqwest-backed transport for the configured upstream URL.
pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    timeout: Timeout,
}

impl HttpUpstream {
    pub fn new(upstream: &Upstream) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in upstream.headers.iter() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .or_err_with(InternalError, || format!("Invalid upstream header name: {name}"))?;
            let value = HeaderValue::from_str(value)
                .or_err_with(InternalError, || format!("Invalid value for upstream header {name}"))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .build()
            .or_err(InternalError, "Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            url: upstream.url.clone(),
            headers,
            timeout: upstream.timeout.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(
        &self,
        request: &JSONRPCRequest,
        session_token: Option<&str>,
        timeout: Duration,
    ) -> BridgeResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_JSON_AND_SSE)
            .timeout(timeout)
            .json(request);

        if let Some(token) = session_token {
            log::debug!("Using session id for {}", request.method);
            builder = builder.header(MCP_SESSION_ID, token);
        }

        log::debug!("Sending {} to {}", request.method, self.url);
        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::from_reqwest(e, timeout.as_secs()))?;

        let status = response.status();
        log::debug!("Upstream response status: {status}");
        if status.is_success() {
            return Ok(response);
        }

        // keep whatever the remote said for the error details
        let body = response.bytes().await.ok().and_then(|b| error_body(&b));
        log::error!("Upstream error status: {status}, body: {body:?}");
        Err(BridgeError::upstream_status(status.as_u16(), body))
    }
}

#[async_trait]
impl UpstreamTransport for HttpUpstream {
    async fn send(
        &self,
        request: &JSONRPCRequest,
        session_token: Option<&str>,
    ) -> BridgeResult<UpstreamReply> {
        let timeout = self.timeout.request_duration();
        let response = self.post(request, session_token, timeout).await?;

        let status = response.status().as_u16();
        let session_token = header_string(response.headers(), MCP_SESSION_ID);
        let content_type = header_string(response.headers(), CONTENT_TYPE.as_str());
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::from_reqwest(e, timeout.as_secs()))?;

        Ok(UpstreamReply {
            status,
            session_token,
            content_type,
            body,
        })
    }

    async fn open_stream(
        &self,
        request: &JSONRPCRequest,
        session_token: Option<&str>,
    ) -> BridgeResult<UpstreamStream> {
        let timeout = self.timeout.stream_duration();
        let response = self.post(request, session_token, timeout).await?;

        let status = response.status().as_u16();
        let session_token = header_string(response.headers(), MCP_SESSION_ID);
        let content_type = header_string(response.headers(), CONTENT_TYPE.as_str());
        let secs = timeout.as_secs();
        let body = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                if e.is_timeout() {
                    BridgeError::Stream(format!("timed out after {secs}s"))
                } else {
                    BridgeError::Stream(e.to_string())
                }
            })
        });

        Ok(UpstreamStream {
            status,
            session_token,
            content_type,
            body: Box::pin(body),
        })
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn error_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
    )
}

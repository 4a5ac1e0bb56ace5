use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    error::{BridgeError, BridgeResult},
    jsonrpc::JSONRPCRequest,
    mcp::session::SessionStore,
    metrics,
    proxy::upstream::{UpstreamReply, UpstreamStream, UpstreamTransport},
    sse_event::{decode_sse_events, looks_like_sse},
};

/// Sends normalized requests to the remote endpoint, keeping its session alive.
///
/// Every non-initialize call is preceded by a handshake when no session token
/// is cached, and carries the cached token once one exists.
pub struct Dispatcher {
    upstream: Arc<dyn UpstreamTransport>,
    sessions: Arc<dyn SessionStore>,
    session_key: String,
    // single-flight for the implicit handshake
    handshake: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        upstream: Arc<dyn UpstreamTransport>,
        sessions: Arc<dyn SessionStore>,
        session_key: impl Into<String>,
    ) -> Self {
        Self {
            upstream,
            sessions,
            session_key: session_key.into(),
            handshake: Mutex::new(()),
        }
    }

    /// Buffered round-trip; the reply is decoded to JSON.
    pub async fn dispatch(&self, request: &JSONRPCRequest) -> BridgeResult<Value> {
        if request.is_initialize() {
            let _guard = self.begin_initialize().await;
            let reply = self.send(request, None).await?;
            self.store_token(reply.session_token.as_deref());
            return Ok(decode_reply(&reply));
        }

        let token = self.session_token().await?;
        let reply = self.send(request, token.as_deref()).await?;
        Ok(decode_reply(&reply))
    }

    /// Streamed round-trip; the caller relays the body as it arrives.
    pub async fn dispatch_stream(&self, request: &JSONRPCRequest) -> BridgeResult<UpstreamStream> {
        if request.is_initialize() {
            let _guard = self.begin_initialize().await;
            let stream = self.open_stream(request, None).await?;
            self.store_token(stream.session_token.as_deref());
            return Ok(stream);
        }

        let token = self.session_token().await?;
        self.open_stream(request, token.as_deref()).await
    }

    /// Clears the cached session and holds the handshake guard.
    ///
    /// Holding it until the reply's token is stored keeps an in-flight implicit
    /// handshake from overwriting the new session.
    async fn begin_initialize(&self) -> MutexGuard<'_, ()> {
        let guard = self.handshake.lock().await;
        self.sessions.invalidate(&self.session_key);
        log::info!("Cleared existing session for re-initialization");
        guard
    }

    /// Returns the cached token, handshaking first when there is none.
    async fn session_token(&self) -> BridgeResult<Option<String>> {
        if let Some(token) = self.sessions.get(&self.session_key) {
            return Ok(Some(token));
        }

        let _guard = self.handshake.lock().await;
        // another request may have finished the handshake while we waited
        if let Some(token) = self.sessions.get(&self.session_key) {
            return Ok(Some(token));
        }

        log::info!("Auto-initializing to get session id");
        metrics::IMPLICIT_HANDSHAKES.inc();
        let reply = self.send(&JSONRPCRequest::handshake(), None).await?;

        self.store_token(reply.session_token.as_deref());
        Ok(reply.session_token)
    }

    async fn send(
        &self,
        request: &JSONRPCRequest,
        token: Option<&str>,
    ) -> BridgeResult<UpstreamReply> {
        let started = Instant::now();
        let result = self.upstream.send(request, token).await;
        metrics::observe_upstream(started, result.is_ok());
        let reply = result?;

        log::info!(method = request.method.as_str(), status = reply.status; "Upstream replied");
        Ok(reply)
    }

    async fn open_stream(
        &self,
        request: &JSONRPCRequest,
        token: Option<&str>,
    ) -> BridgeResult<UpstreamStream> {
        let started = Instant::now();
        let result = self.upstream.open_stream(request, token).await;
        metrics::observe_upstream(started, result.is_ok());
        let stream = result?;

        log::info!(method = request.method.as_str(), status = stream.status; "Opened upstream stream");
        Ok(stream)
    }

    fn store_token(&self, token: Option<&str>) {
        match token {
            Some(token) => {
                log::info!("Session id stored for key {}", self.session_key);
                self.sessions.set(&self.session_key, token.to_string());
            }
            None => log::debug!("Upstream returned no session id"),
        }
    }
}

/// Turns a buffered reply into JSON.
///
/// SSE bodies yield the first event's data; when that is not JSON the raw text
/// is returned as a string. Empty bodies are `null`.
pub fn decode_reply(reply: &UpstreamReply) -> Value {
    let text = String::from_utf8_lossy(&reply.body);

    if looks_like_sse(reply.content_type.as_deref(), &text) {
        return match decode_first_sse_payload(&reply.body) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{e}");
                Value::String(text.into_owned())
            }
        };
    }

    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&reply.body).unwrap_or_else(|_| Value::String(text.into_owned()))
}

fn decode_first_sse_payload(body: &[u8]) -> BridgeResult<Value> {
    let events = decode_sse_events(body);
    let first = events
        .first()
        .ok_or_else(|| BridgeError::SseDecode("no data event in SSE body".to_string()))?;
    serde_json::from_str(&first.data).map_err(|e| BridgeError::SseDecode(e.to_string()))
}

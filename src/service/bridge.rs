use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_error::{Error, ErrorType, Result};
use pingora_proxy::{ProxyHttp, Session};

use crate::{
    config::BridgeConfig,
    error::BridgeResult,
    mcp::{normalizer, BridgeReply, Dispatcher},
    proxy::BridgeContext,
    service::{body::read_request_body, endpoint, response::ResponseBuilder},
};

/// Bridge service.
///
/// Answers every request itself; nothing is proxied through pingora's upstream path.
pub struct BridgeProxyService {
    pub config: Arc<BridgeConfig>,
    pub dispatcher: Arc<Dispatcher>,
}

impl BridgeProxyService {
    pub fn new(config: Arc<BridgeConfig>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Reads, normalizes and forwards one bridge call.
    pub async fn bridge(
        &self,
        session: &mut Session,
        ctx: &mut BridgeContext,
    ) -> BridgeResult<BridgeReply> {
        let body = read_request_body(session, self.config.max_body_size).await?;
        log::debug!(
            "[{}] Received from caller: {}",
            ctx.request_id,
            String::from_utf8_lossy(&body)
        );

        let payload = normalizer::parse_inbound(&body)?;
        let request = normalizer::normalize(&payload);
        ctx.method = Some(request.method.clone());
        log::debug!(
            "[{}] Normalized payload: {}",
            ctx.request_id,
            serde_json::to_string(&request).unwrap_or_default()
        );

        if ctx.output_mode.relays(self.config.sse_mode) {
            log::info!(
                "[{}] Opening SSE relay for {} (id {})",
                ctx.request_id,
                request.method,
                request.id
            );
            let stream = self.dispatcher.dispatch_stream(&request).await?;
            return BridgeReply::from_stream(stream).await;
        }

        log::info!(
            "[{}] Forwarding {} (id {})",
            ctx.request_id,
            request.method,
            request.id
        );
        let value = self.dispatcher.dispatch(&request).await?;
        Ok(BridgeReply::buffered(value, ctx.output_mode))
    }

    /// Writes a reply in the framing chosen for this request.
    pub async fn send_reply(&self, session: &mut Session, reply: BridgeReply) -> Result<bool> {
        match reply {
            BridgeReply::Json(value) => {
                ResponseBuilder::send_json(session, StatusCode::OK, &value).await
            }
            BridgeReply::BufferedSse(value) => self.response_buffered_sse(session, &value).await,
            BridgeReply::LiveSse(stream) => self.response_live_sse(session, stream).await,
        }
    }
}

#[async_trait]
impl ProxyHttp for BridgeProxyService {
    type CTX = BridgeContext;

    /// Creates a new context for each request
    fn new_ctx(&self) -> Self::CTX {
        Self::CTX::default()
    }

    /// Routes and answers the request.
    ///
    /// Always returns `Ok(true)` once a response is written so the proxy exits.
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        log::debug!(
            "[{}] Request: {} {:?}",
            ctx.request_id,
            session.req_header().method,
            session.req_header().uri.path_and_query()
        );
        endpoint::route_request(self, session, ctx).await
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Error::e_explain(
            ErrorType::InternalError,
            "bridge answers in request_filter and has no upstream peer",
        )
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        let status = session
            .response_written()
            .map_or(0, |resp| resp.status.as_u16());
        let elapsed_ms = ctx.request_start.elapsed().as_millis() as u64;
        let mode = ctx.output_mode.as_str();
        let method = ctx.method.as_deref().unwrap_or("-");

        match e {
            Some(e) => log::error!(
                status = status, elapsed_ms = elapsed_ms, mode = mode, rpc_method = method;
                "[{}] {} {} failed: {e}",
                ctx.request_id,
                session.req_header().method,
                session.req_header().uri.path()
            ),
            None => log::info!(
                status = status, elapsed_ms = elapsed_ms, mode = mode, rpc_method = method;
                "[{}] {} {}",
                ctx.request_id,
                session.req_header().method,
                session.req_header().uri.path()
            ),
        }
    }
}

use futures::StreamExt;
use pingora_error::Result;
use pingora_proxy::Session;
use serde_json::Value;

use crate::{
    mcp::transcoder::{relay, sse_payload},
    proxy::upstream::UpstreamStream,
    service::response::ResponseBuilder,
};

use super::bridge::BridgeProxyService;

impl BridgeProxyService {
    /// Sends a buffered reply as a single `data:` event, then ends the stream
    pub async fn response_buffered_sse(&self, session: &mut Session, value: &Value) -> Result<bool> {
        let resp = ResponseBuilder::sse_header()?;
        session.write_response_header(Box::new(resp), false).await?;
        session
            .write_response_body(Some(sse_payload(value)), true)
            .await
            .map_err(|e| {
                log::error!("[SSE] Failed to send event: {e}");
                e
            })?;
        Ok(true)
    }

    /// Relays the remote stream chunk by chunk.
    ///
    /// A client write failure drops the relay, which closes the upstream connection.
    pub async fn response_live_sse(
        &self,
        session: &mut Session,
        upstream: UpstreamStream,
    ) -> Result<bool> {
        let resp = ResponseBuilder::sse_header()?;
        session.write_response_header(Box::new(resp), false).await?;

        let mut body_stream = Box::pin(relay(upstream.body));
        while let Some(chunk) = body_stream.next().await {
            if let Err(e) = session.write_response_body(Some(chunk), false).await {
                log::warn!("[SSE] Client went away, closing upstream stream: {e}");
                return Ok(true);
            }
        }

        session.write_response_body(None, true).await?;
        Ok(true)
    }
}

use bytes::Bytes;
use http::{
    header::{CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE},
    StatusCode,
};
use pingora_error::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::Session;
use serde_json::{json, Value};

use crate::{
    config::NO_ADDITIONAL_INFO,
    error::BridgeError,
    service::constants::{CONTENT_TYPE_JSON, CONTENT_TYPE_SSE},
};

/// HTTP response builder and sender
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Builds and sends HTTP responses
    ///
    /// # Arguments
    /// * `session` - The HTTP session to write response to
    /// * `code` - HTTP status code
    /// * `content_type` - Content-Type header value
    /// * `body` - Optional response body
    pub async fn build_and_send(
        session: &mut Session,
        code: StatusCode,
        content_type: &str,
        body: Option<Bytes>,
    ) -> Result<bool> {
        let mut resp = ResponseHeader::build(code, None)?;
        resp.insert_header(CONTENT_TYPE, content_type)?;

        if let Some(body) = &body {
            resp.insert_header(CONTENT_LENGTH, body.len().to_string())?;
        }

        session.write_response_header(Box::new(resp), false).await?;
        session.write_response_body(body, true).await.map_err(|e| {
            log::error!("Failed to write response body: {e}");
            e
        })?;

        Ok(true)
    }

    /// Builds and sends a JSON response
    pub async fn send_json(session: &mut Session, code: StatusCode, data: &Value) -> Result<bool> {
        let body = Bytes::from(data.to_string());
        Self::build_and_send(session, code, CONTENT_TYPE_JSON, Some(body)).await
    }

    /// Sends `{ "error": ..., "details": ... }` for a failed bridge call
    pub async fn send_bridge_error(session: &mut Session, err: &BridgeError) -> Result<bool> {
        Self::send_json(
            session,
            StatusCode::INTERNAL_SERVER_ERROR,
            &err.to_response_body(),
        )
        .await
    }

    /// Sends an error body with a fixed message, same shape as bridge errors
    pub async fn send_error(session: &mut Session, code: StatusCode, message: &str) -> Result<bool> {
        let body = json!({ "error": message, "details": NO_ADDITIONAL_INFO });
        Self::send_json(session, code, &body).await
    }

    /// Response header for an event stream reply
    pub fn sse_header() -> Result<ResponseHeader> {
        let mut resp = ResponseHeader::build(StatusCode::OK, Some(4))?;
        resp.insert_header(CONTENT_TYPE, CONTENT_TYPE_SSE)?;
        resp.insert_header(CACHE_CONTROL, "no-cache")?;
        resp.insert_header(CONNECTION, "keep-alive")?;
        Ok(resp)
    }
}

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

use crate::{
    config::SseMode,
    error::BridgeResult,
    mcp::dispatcher::decode_reply,
    proxy::upstream::{ByteStream, UpstreamReply, UpstreamStream},
    service::constants::CONTENT_TYPE_SSE,
    sse_event::SseEvent,
};

/// Framing the caller asked for, decided once from its `Accept` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Json,
    Sse,
}

impl OutputMode {
    pub fn from_accept(accept: Option<&str>) -> Self {
        match accept {
            Some(accept) if accept.contains("text/event-stream") => OutputMode::Sse,
            _ => OutputMode::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Json => "json",
            OutputMode::Sse => "sse",
        }
    }

    /// Whether the remote stream should be relayed live for this caller.
    pub fn relays(&self, sse_mode: SseMode) -> bool {
        *self == OutputMode::Sse && sse_mode == SseMode::Relay
    }
}

/// What is written back to the caller.
pub enum BridgeReply {
    Json(Value),
    BufferedSse(Value),
    LiveSse(UpstreamStream),
}

impl BridgeReply {
    /// Wraps a decoded remote reply for the caller's framing.
    pub fn buffered(value: Value, mode: OutputMode) -> Self {
        match mode {
            OutputMode::Json => BridgeReply::Json(value),
            OutputMode::Sse => BridgeReply::BufferedSse(value),
        }
    }

    /// Relays SSE remotes live. Any other reply is drained, decoded and sent
    /// as a single event so the caller always gets `data:` framing.
    pub async fn from_stream(stream: UpstreamStream) -> BridgeResult<Self> {
        let is_sse = stream
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains(CONTENT_TYPE_SSE));
        if is_sse {
            return Ok(BridgeReply::LiveSse(stream));
        }

        log::debug!("Remote answered {:?}, buffering before SSE framing", stream.content_type);
        let UpstreamStream {
            status,
            session_token,
            content_type,
            mut body,
        } = stream;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let reply = UpstreamReply {
            status,
            session_token,
            content_type,
            body: buf.freeze(),
        };
        Ok(BridgeReply::BufferedSse(decode_reply(&reply)))
    }
}

/// `data: <json>\n\n`
pub fn sse_payload(value: &Value) -> Bytes {
    SseEvent::new(&value.to_string()).to_bytes()
}

/// Final event appended when a relayed stream breaks.
pub fn sse_error_event(message: &str) -> Bytes {
    sse_payload(&json!({ "error": message }))
}

/// Relays upstream chunks verbatim; an upstream error ends the stream with one
/// error event.
pub fn relay(mut upstream: ByteStream) -> impl Stream<Item = Bytes> + Send {
    stream! {
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    log::trace!("Streaming chunk of {} bytes", bytes.len());
                    yield bytes;
                }
                Err(e) => {
                    log::error!("Stream error: {e}");
                    yield sse_error_event(&e.to_string());
                    break;
                }
            }
        }
        log::debug!("Upstream stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_output_mode_from_accept() {
        assert_eq!(OutputMode::from_accept(None), OutputMode::Json);
        assert_eq!(OutputMode::from_accept(Some("application/json")), OutputMode::Json);
        assert_eq!(OutputMode::from_accept(Some("text/event-stream")), OutputMode::Sse);
        assert_eq!(
            OutputMode::from_accept(Some("application/json, text/event-stream")),
            OutputMode::Sse
        );
    }

    #[test]
    fn test_relays_only_for_sse_in_relay_mode() {
        assert!(OutputMode::Sse.relays(SseMode::Relay));
        assert!(!OutputMode::Sse.relays(SseMode::Buffered));
        assert!(!OutputMode::Json.relays(SseMode::Relay));
    }

    #[test]
    fn test_buffered_reply_follows_mode() {
        assert!(matches!(
            BridgeReply::buffered(json!({}), OutputMode::Json),
            BridgeReply::Json(_)
        ));
        assert!(matches!(
            BridgeReply::buffered(json!({}), OutputMode::Sse),
            BridgeReply::BufferedSse(_)
        ));
    }

    #[test]
    fn test_sse_payload_framing() {
        assert_eq!(
            sse_payload(&json!({"result": 42})),
            Bytes::from("data: {\"result\":42}\n\n")
        );
        assert_eq!(
            sse_error_event("boom"),
            Bytes::from("data: {\"error\":\"boom\"}\n\n")
        );
    }

    fn upstream_stream(content_type: &str, chunks: Vec<BridgeResult<Bytes>>) -> UpstreamStream {
        UpstreamStream {
            status: 200,
            session_token: None,
            content_type: Some(content_type.to_string()),
            body: Box::pin(futures::stream::iter(chunks)),
        }
    }

    #[tokio::test]
    async fn test_json_remote_is_framed_as_one_event() {
        let stream = upstream_stream(
            "application/json",
            vec![Ok(Bytes::from("{\"result\"")), Ok(Bytes::from(":42}"))],
        );
        match BridgeReply::from_stream(stream).await.unwrap() {
            BridgeReply::BufferedSse(value) => {
                assert_eq!(value, json!({"result": 42}));
                assert_eq!(sse_payload(&value), Bytes::from("data: {\"result\":42}\n\n"));
            }
            _ => panic!("expected a buffered SSE reply"),
        }
    }

    #[tokio::test]
    async fn test_sse_remote_is_relayed_live() {
        let stream = upstream_stream(
            "text/event-stream; charset=utf-8",
            vec![Ok(Bytes::from("data: {}\n\n"))],
        );
        assert!(matches!(
            BridgeReply::from_stream(stream).await.unwrap(),
            BridgeReply::LiveSse(_)
        ));
    }

    #[tokio::test]
    async fn test_broken_json_remote_is_an_error() {
        let stream = upstream_stream(
            "application/json",
            vec![Err(BridgeError::Stream("connection reset".to_string()))],
        );
        let err = BridgeReply::from_stream(stream).await.err().unwrap();
        assert!(matches!(err, BridgeError::Stream(_)));
    }

    #[tokio::test]
    async fn test_relay_preserves_chunks() {
        let chunks: Vec<Result<Bytes, BridgeError>> = vec![
            Ok(Bytes::from("event: message\n")),
            Ok(Bytes::from("data: {\"a\":1}\n\n")),
        ];
        let relayed: Vec<Bytes> = relay(Box::pin(futures::stream::iter(chunks))).collect().await;
        assert_eq!(
            relayed,
            vec![
                Bytes::from("event: message\n"),
                Bytes::from("data: {\"a\":1}\n\n")
            ]
        );
    }

    #[tokio::test]
    async fn test_relay_appends_one_error_event() {
        let chunks: Vec<Result<Bytes, BridgeError>> = vec![
            Ok(Bytes::from("data: {\"a\":1}\n\n")),
            Err(BridgeError::Stream("connection reset".to_string())),
            Ok(Bytes::from("data: never\n\n")),
        ];
        let relayed: Vec<Bytes> = relay(Box::pin(futures::stream::iter(chunks))).collect().await;
        assert_eq!(relayed.len(), 2);
        assert_eq!(
            relayed[1],
            Bytes::from("data: {\"error\":\"Upstream stream failed: connection reset\"}\n\n")
        );
    }
}

//! Errors raised while bridging a request.

use serde_json::{json, Value};
use thiserror::Error;

use crate::config::NO_ADDITIONAL_INFO;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur between reading the inbound body and writing the reply.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Inbound body is not valid JSON.
    #[error("Failed to parse request body: {0}")]
    Parse(#[from] serde_json::Error),

    /// Inbound body is larger than the configured limit.
    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// Inbound body could not be read from the connection.
    #[error("Failed to read request body: {0}")]
    ReadBody(String),

    /// Remote call failed: non-2xx status, transport error or timeout.
    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        body: Option<Value>,
    },

    /// A live relay stream from the remote broke after headers were sent.
    #[error("Upstream stream failed: {0}")]
    Stream(String),

    /// Remote SSE data could not be decoded as JSON.
    #[error("Failed to decode SSE payload: {0}")]
    SseDecode(String),
}

impl BridgeError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    pub fn upstream_status(status: u16, body: Option<Value>) -> Self {
        Self::Upstream {
            status: Some(status),
            message: format!("Request failed with status code {status}"),
            body,
        }
    }

    /// Maps a reqwest failure, keeping timeouts recognisable.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::upstream(format!("Upstream request timed out after {timeout_secs}s"))
        } else if err.is_connect() {
            Self::upstream(format!("Failed to connect to upstream: {err}"))
        } else {
            Self::upstream(format!("Upstream request failed: {err}"))
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::ReadBody(_) => "read_body",
            Self::Upstream { .. } => "upstream",
            Self::Stream(_) => "stream",
            Self::SseDecode(_) => "sse_decode",
        }
    }

    /// Remote body when the remote answered, a fixed marker otherwise.
    pub fn details(&self) -> Value {
        match self {
            Self::Upstream {
                body: Some(body), ..
            } => body.clone(),
            _ => Value::String(NO_ADDITIONAL_INFO.to_string()),
        }
    }

    /// `{ "error": ..., "details": ... }` body returned with a 500.
    pub fn to_response_body(&self) -> Value {
        json!({
            "error": self.to_string(),
            "details": self.details(),
        })
    }
}

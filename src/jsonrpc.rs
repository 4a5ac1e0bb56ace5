use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};

use crate::config::{SERVER_NAME, SERVER_VERSION};

pub const LATEST_PROTOCOL_VERSION: &str = "2024-11-05";
pub const JSONRPC_VERSION: &str = "2.0";

pub const INITIALIZE_METHOD: &str = "initialize";
pub const UNKNOWN_METHOD: &str = "unknown";

/// Id of the handshake the bridge sends on the caller's behalf.
pub const HANDSHAKE_REQUEST_ID: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(Number::from(value))
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

/// Canonical JSON-RPC 2.0 request forwarded to the remote endpoint.
///
/// Field order matches the wire order: `jsonrpc`, `method`, `params`, `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: RequestId,
}

impl JSONRPCRequest {
    pub fn is_initialize(&self) -> bool {
        self.method == INITIALIZE_METHOD
    }

    /// The fixed `initialize` the bridge sends before a caller's first call.
    pub fn handshake() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: INITIALIZE_METHOD.to_string(),
            params: json!({
                "protocolVersion": LATEST_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": client_info(),
            }),
            id: RequestId::from(HANDSHAKE_REQUEST_ID),
        }
    }
}

/// Identity the bridge presents to the remote endpoint.
pub fn client_info() -> Value {
    json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
    })
}

use serde_json::{Map, Value};

use crate::{
    error::BridgeResult,
    jsonrpc::{
        client_info, JSONRPCRequest, RequestId, JSONRPC_VERSION, LATEST_PROTOCOL_VERSION,
        UNKNOWN_METHOD,
    },
};

/// Parses an inbound body: a JSON object, or a JSON string holding one.
///
/// An empty body is read as `{}`.
pub fn parse_inbound(body: &[u8]) -> BridgeResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_slice::<Value>(body)? {
        Value::String(inner) => Ok(serde_json::from_str(&inner)?),
        value => Ok(value),
    }
}

/// Builds a JSON-RPC request, falling back to the wall clock for a missing id.
pub fn normalize(payload: &Value) -> JSONRPCRequest {
    normalize_with_id(payload, || {
        RequestId::from(chrono::Utc::now().timestamp_millis())
    })
}

pub fn normalize_with_id<F>(payload: &Value, fallback_id: F) -> JSONRPCRequest
where
    F: FnOnce() -> RequestId,
{
    let jsonrpc = non_empty_str(payload.get("jsonrpc"))
        .unwrap_or(JSONRPC_VERSION)
        .to_string();

    let method = ["method", "action"]
        .iter()
        .find_map(|key| non_empty_str(payload.get(key)))
        .unwrap_or(UNKNOWN_METHOD)
        .to_string();

    let params = ["params", "body", "data"]
        .iter()
        .filter_map(|key| payload.get(key))
        .find(|value| value.is_object() || value.is_array())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    // any string or number counts, 0 and "" included
    let id = match payload.get("id") {
        Some(Value::Number(n)) => RequestId::Number(n.clone()),
        Some(Value::String(s)) => RequestId::String(s.clone()),
        _ => fallback_id(),
    };

    let mut request = JSONRPCRequest {
        jsonrpc,
        method,
        params,
        id,
    };
    if request.is_initialize() {
        fill_initialize_defaults(&mut request.params);
    }
    request
}

/// Completes an `initialize` payload the remote would otherwise reject.
///
/// Only missing pieces are filled; whatever the caller sent is kept. Non-object
/// params carry no client identity and are replaced outright.
fn fill_initialize_defaults(params: &mut Value) {
    if !params.is_object() {
        *params = Value::Object(Map::new());
    }
    let Value::Object(params) = params else {
        return;
    };

    let has_version = non_empty_str(params.get("protocolVersion")).is_some();
    let has_client = params
        .get("clientInfo")
        .and_then(Value::as_object)
        .is_some_and(|info| !info.is_empty());
    if has_version && has_client {
        return;
    }

    if !has_version {
        params.insert(
            "protocolVersion".to_string(),
            Value::String(LATEST_PROTOCOL_VERSION.to_string()),
        );
    }
    if params.get("capabilities").map_or(true, Value::is_null) {
        params.insert("capabilities".to_string(), Value::Object(Map::new()));
    }
    if !has_client {
        params.insert("clientInfo".to_string(), client_info());
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

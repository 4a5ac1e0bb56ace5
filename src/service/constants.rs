// Shared constants for service module

/// HTTP header carrying the remote session token
pub const MCP_SESSION_ID: &str = "mcp-session-id";
/// Accept value sent upstream, the remote may answer in either framing
pub const ACCEPT_JSON_AND_SSE: &str = "application/json, text/event-stream";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_SSE: &str = "text/event-stream";

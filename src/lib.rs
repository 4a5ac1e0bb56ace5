//! MCP bridge.
//!
//! Accepts loosely shaped JSON calls, turns them into JSON-RPC requests for a single
//! remote MCP server, keeps its session token and replies in JSON or SSE framing.

pub mod cli;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod logging;
pub mod mcp;
pub mod metrics;
pub mod proxy;
pub mod service;
pub mod sse_event;
pub mod utils;

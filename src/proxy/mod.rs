pub mod upstream;

use std::time::Instant;

use crate::mcp::OutputMode;

/// Per-request state carried through the pingora phases.
#[derive(Debug)]
pub struct BridgeContext {
    pub request_id: String,
    pub request_start: Instant,
    pub output_mode: OutputMode,
    pub method: Option<String>,
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            request_start: Instant::now(),
            output_mode: OutputMode::default(),
            method: None,
        }
    }
}

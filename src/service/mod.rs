pub mod body;
pub mod bridge;
pub mod constants;
pub mod endpoint;
pub mod response;
pub mod sse;

pub use bridge::BridgeProxyService;

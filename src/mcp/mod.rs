//! JSON-RPC bridging: request normalization, session handling, reply framing.

pub mod dispatcher;
pub mod normalizer;
pub mod session;
pub mod transcoder;

pub use dispatcher::Dispatcher;
pub use session::{InMemorySessionStore, SessionStore};
pub use transcoder::{BridgeReply, OutputMode};

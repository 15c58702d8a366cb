//! MCP transport
//!
//! - `protocol` - JSON-RPC and MCP message types
//! - `session` - per-client sessions and server-to-client requests
//! - `server` - method handling on top of the [`Dispatcher`](crate::tools::Dispatcher)
//! - `sse` - the axum HTTP + SSE adapter

pub mod protocol;
mod server;
mod session;
mod sse;

pub use server::*;
pub use session::*;
pub use sse::*;

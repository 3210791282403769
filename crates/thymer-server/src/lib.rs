//! # thymer-server
//!
//! Network surfaces around the bridge:
//! - the WebSocket endpoint the peer connects to ([`ws`])
//! - the local HTTP API ([`api`])
//! - the MCP JSON-RPC endpoint ([`mcp`]), started and stopped by [`lifecycle`]

pub mod api;
pub mod errors;
pub mod lifecycle;
pub mod mcp;
pub mod server;
pub mod state;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::GatewayError;
pub use server::{start, ServerHandle};
pub use state::AppState;

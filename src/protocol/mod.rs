//! Line-delimited JSON-RPC 2.0 protocol engine.
//!
//! Implements the MCP handshake and tool dispatch over any async
//! reader/writer pair: stdin/stdout in production, in-memory duplex pipes
//! in tests.

pub mod messages;
pub mod server;

pub use messages::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, error_codes};
pub use server::{McpServer, SessionState};

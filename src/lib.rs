//! PostgreSQL MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to query and introspect PostgreSQL databases over a line-delimited
//! JSON-RPC stdio transport.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod protocol;
pub mod tools;

pub use config::{Config, ConnectionConfig};
pub use db::DbClient;
pub use error::DbError;
pub use protocol::McpServer;

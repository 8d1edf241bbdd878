//! MCP tool implementations.
//!
//! This module contains the tool registry and all tool handlers:
//! - `query`: validated SQL execution
//! - `explain_query`: query plan inspection
//! - schema tools: `list_schemas`, `list_tables`, `describe_table`,
//!   `list_views`, `describe_view`, `list_functions`, `list_indexes`,
//!   `list_constraints`, `get_table_stats`, `search_columns`,
//!   `get_database_info`
//! - `sql_validator`: statement classification guarding the SQL-executing
//!   tools

pub mod query;
pub mod registry;
pub mod schema;
pub mod sql_validator;

pub use query::{ExplainInput, QueryInput, QueryToolHandler};
pub use registry::{ToolDefinition, ToolDispatcher, ToolId, ToolRegistry};
pub use schema::SchemaToolHandler;

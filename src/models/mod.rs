//! Data models for tool results.
//!
//! These types define the JSON payloads returned by the MCP tools:
//! query results and schema introspection records.

pub mod query;
pub mod schema;

pub use query::{ErrorPayload, QueryOutcome};
pub use schema::{
    ColumnDescription, ColumnMatch, ConstraintInfo, DatabaseInfo, ForeignKeyInfo, FunctionEntry,
    IndexInfo, TableDescription, TableEntry, TableStats, ViewDefinition, ViewEntry,
};

//! Query execution tools.
//!
//! Implements the `query` and `explain_query` MCP tools. Both run arbitrary
//! SQL supplied by the client and are therefore gated by the SQL validator
//! inside the database client; the handlers here are the typed glue between
//! tool arguments and client operations.

use crate::db::{DbClient, ExplainOutcome};
use crate::error::DbResult;
use crate::models::QueryOutcome;
use schemars::JsonSchema;
use serde::Deserialize;

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// SQL statement to execute. One statement per call.
    pub sql: String,
    /// Allow INSERT/UPDATE/DELETE/MERGE. DDL is always rejected.
    #[serde(default)]
    pub allow_write: bool,
    /// Maximum number of rows to return. Extra rows are dropped after
    /// execution; row_count still reports the full count.
    #[serde(default)]
    pub max_rows: Option<u32>,
}

/// Input for the explain_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainInput {
    /// SQL statement to explain.
    pub sql: String,
    /// If true, the statement is actually executed to collect runtime
    /// measurements. Only read statements are accepted in this mode.
    #[serde(default)]
    pub analyze: bool,
}

/// Handler for the SQL execution tools.
#[derive(Debug, Clone)]
pub struct QueryToolHandler {
    client: DbClient,
}

impl QueryToolHandler {
    /// Create a new query tool handler.
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// Handle the query tool call.
    pub async fn query(&self, input: QueryInput) -> DbResult<QueryOutcome> {
        self.client
            .execute_query(&input.sql, input.allow_write, input.max_rows)
            .await
    }

    /// Handle the explain_query tool call.
    pub async fn explain(&self, input: ExplainInput) -> DbResult<ExplainOutcome> {
        self.client.explain_query(&input.sql, input.analyze).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_input_defaults() {
        let input: QueryInput = serde_json::from_value(json!({"sql": "SELECT 1"})).unwrap();
        assert_eq!(input.sql, "SELECT 1");
        assert!(!input.allow_write);
        assert_eq!(input.max_rows, None);
    }

    #[test]
    fn test_query_input_missing_sql_fails() {
        let result = serde_json::from_value::<QueryInput>(json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_explain_input_defaults() {
        let input: ExplainInput =
            serde_json::from_value(json!({"sql": "SELECT * FROM t"})).unwrap();
        assert!(!input.analyze);
    }
}

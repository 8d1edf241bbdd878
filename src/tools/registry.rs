//! Tool registry and dispatch.
//!
//! The registry is a static table built once at startup: tool name,
//! description, and a JSON Schema generated from the same typed input
//! struct the dispatcher deserializes into, so the advertised schema and
//! the accepted arguments cannot drift apart. Dispatch goes through the
//! `ToolId` enum - an unknown name fails the lookup explicitly instead of
//! reaching any handler.

use crate::db::DbClient;
use crate::error::{DbError, DbResult};
use crate::models::ErrorPayload;
use crate::tools::query::{ExplainInput, QueryInput, QueryToolHandler};
use crate::tools::schema::{
    DatabaseInfoInput, DescribeTableInput, DescribeViewInput, ListConstraintsInput,
    ListFunctionsInput, ListIndexesInput, ListSchemasInput, ListTablesInput, ListViewsInput,
    SchemaToolHandler, SearchColumnsInput, TableStatsInput,
};
use schemars::{JsonSchema, schema_for};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

/// Enumeration of every tool this server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    Query,
    ListSchemas,
    ListTables,
    DescribeTable,
    ListViews,
    DescribeView,
    ListFunctions,
    ListIndexes,
    ListConstraints,
    GetTableStats,
    ExplainQuery,
    SearchColumns,
    GetDatabaseInfo,
}

impl ToolId {
    pub const ALL: [ToolId; 13] = [
        ToolId::Query,
        ToolId::ListSchemas,
        ToolId::ListTables,
        ToolId::DescribeTable,
        ToolId::ListViews,
        ToolId::DescribeView,
        ToolId::ListFunctions,
        ToolId::ListIndexes,
        ToolId::ListConstraints,
        ToolId::GetTableStats,
        ToolId::ExplainQuery,
        ToolId::SearchColumns,
        ToolId::GetDatabaseInfo,
    ];

    /// Wire name of the tool.
    pub fn name(self) -> &'static str {
        match self {
            ToolId::Query => "query",
            ToolId::ListSchemas => "list_schemas",
            ToolId::ListTables => "list_tables",
            ToolId::DescribeTable => "describe_table",
            ToolId::ListViews => "list_views",
            ToolId::DescribeView => "describe_view",
            ToolId::ListFunctions => "list_functions",
            ToolId::ListIndexes => "list_indexes",
            ToolId::ListConstraints => "list_constraints",
            ToolId::GetTableStats => "get_table_stats",
            ToolId::ExplainQuery => "explain_query",
            ToolId::SearchColumns => "search_columns",
            ToolId::GetDatabaseInfo => "get_database_info",
        }
    }

    /// Resolve a wire name to a tool id. Unknown names are a lookup miss,
    /// not an error value - the caller decides how to report them.
    pub fn from_name(name: &str) -> Option<ToolId> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolId::Query => {
                "Execute a SQL statement against the PostgreSQL database.\n\
                 Read-only by default; set allow_write to true for INSERT/UPDATE/DELETE.\n\
                 DDL (CREATE/DROP/ALTER/TRUNCATE) is always rejected.\n\
                 Use max_rows to bound the result set."
            }
            ToolId::ListSchemas => {
                "List all schemas in the database, excluding system schemas.\n\
                 Returns a JSON array of schema names."
            }
            ToolId::ListTables => {
                "List all tables and views in a schema (default: public).\n\
                 Returns name and type for each entry."
            }
            ToolId::DescribeTable => {
                "Describe the structure of a table: columns with types, nullability\n\
                 and defaults, primary keys, and foreign key references."
            }
            ToolId::ListViews => "List all views in a schema (default: public).",
            ToolId::DescribeView => {
                "Show the definition of a view, including updatability and check option."
            }
            ToolId::ListFunctions => {
                "List functions and procedures in a schema (default: public)."
            }
            ToolId::ListIndexes => {
                "List indexes on a table: columns, uniqueness, and access method."
            }
            ToolId::ListConstraints => {
                "List constraints on a table.\n\
                 Each entry carries its type: PRIMARY KEY, FOREIGN KEY, UNIQUE, or CHECK."
            }
            ToolId::GetTableStats => {
                "Report the estimated row count and total size of a table.\n\
                 The row count comes from catalog statistics (ANALYZE), not COUNT(*);\n\
                 -1 means the table has never been analyzed."
            }
            ToolId::ExplainQuery => {
                "Show the execution plan for a SQL statement as EXPLAIN (FORMAT JSON).\n\
                 With analyze=true the statement is EXECUTED to collect real timings -\n\
                 only read statements are accepted in that mode."
            }
            ToolId::SearchColumns => {
                "Find columns whose name contains a substring, across all user schemas.\n\
                 Matching is case-insensitive."
            }
            ToolId::GetDatabaseInfo => {
                "Report the current database name, server version, user, encoding, and size."
            }
        }
    }

    fn input_schema(self) -> JsonValue {
        match self {
            ToolId::Query => schema_value::<QueryInput>(),
            ToolId::ListSchemas => schema_value::<ListSchemasInput>(),
            ToolId::ListTables => schema_value::<ListTablesInput>(),
            ToolId::DescribeTable => schema_value::<DescribeTableInput>(),
            ToolId::ListViews => schema_value::<ListViewsInput>(),
            ToolId::DescribeView => schema_value::<DescribeViewInput>(),
            ToolId::ListFunctions => schema_value::<ListFunctionsInput>(),
            ToolId::ListIndexes => schema_value::<ListIndexesInput>(),
            ToolId::ListConstraints => schema_value::<ListConstraintsInput>(),
            ToolId::GetTableStats => schema_value::<TableStatsInput>(),
            ToolId::ExplainQuery => schema_value::<ExplainInput>(),
            ToolId::SearchColumns => schema_value::<SearchColumnsInput>(),
            ToolId::GetDatabaseInfo => schema_value::<DatabaseInfoInput>(),
        }
    }
}

fn schema_value<T: JsonSchema>() -> JsonValue {
    serde_json::to_value(schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// A single advertised tool: name, description, and input schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonValue,
}

/// Immutable table of all tool definitions, built once at startup.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Build the registry. No tools can be added after this point.
    pub fn new() -> Self {
        let definitions = ToolId::ALL
            .into_iter()
            .map(|id| ToolDefinition {
                name: id.name().to_string(),
                description: id.description().to_string(),
                input_schema: id.input_schema(),
            })
            .collect();
        Self { definitions }
    }

    /// All tool definitions, for tools/list.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes a tool id plus raw arguments to the matching handler and
/// normalizes the outcome into a JSON payload.
///
/// Handler failures become `{success: false, error, stage}` payloads here;
/// they are tool results, never transport errors.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    query: QueryToolHandler,
    schema: SchemaToolHandler,
}

impl ToolDispatcher {
    /// Create a dispatcher around a database client.
    pub fn new(client: DbClient) -> Self {
        Self {
            query: QueryToolHandler::new(client.clone()),
            schema: SchemaToolHandler::new(client),
        }
    }

    /// Run one tool call and return its JSON payload.
    pub async fn dispatch(&self, id: ToolId, arguments: JsonValue) -> JsonValue {
        let result = self.dispatch_inner(id, arguments).await;
        match result {
            Ok(payload) => payload,
            Err(err) => {
                match err.stage() {
                    crate::error::ErrorStage::Validation => {
                        warn!(tool = id.name(), error = %err, "Tool call rejected")
                    }
                    stage => {
                        error!(tool = id.name(), stage = stage.as_str(), error = %err, "Tool call failed")
                    }
                }
                to_json(&ErrorPayload::from(&err)).unwrap_or_else(|fallback| fallback)
            }
        }
    }

    async fn dispatch_inner(&self, id: ToolId, arguments: JsonValue) -> DbResult<JsonValue> {
        match id {
            ToolId::Query => {
                let input = parse_input::<QueryInput>(id, arguments)?;
                self.query.query(input).await.and_then(|v| ok_json(&v))
            }
            ToolId::ExplainQuery => {
                let input = parse_input::<ExplainInput>(id, arguments)?;
                self.query.explain(input).await.and_then(|v| ok_json(&v))
            }
            ToolId::ListSchemas => {
                let input = parse_input::<ListSchemasInput>(id, arguments)?;
                self.schema
                    .list_schemas(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::ListTables => {
                let input = parse_input::<ListTablesInput>(id, arguments)?;
                self.schema
                    .list_tables(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::DescribeTable => {
                let input = parse_input::<DescribeTableInput>(id, arguments)?;
                self.schema
                    .describe_table(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::ListViews => {
                let input = parse_input::<ListViewsInput>(id, arguments)?;
                self.schema
                    .list_views(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::DescribeView => {
                let input = parse_input::<DescribeViewInput>(id, arguments)?;
                self.schema
                    .describe_view(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::ListFunctions => {
                let input = parse_input::<ListFunctionsInput>(id, arguments)?;
                self.schema
                    .list_functions(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::ListIndexes => {
                let input = parse_input::<ListIndexesInput>(id, arguments)?;
                self.schema
                    .list_indexes(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::ListConstraints => {
                let input = parse_input::<ListConstraintsInput>(id, arguments)?;
                self.schema
                    .list_constraints(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::GetTableStats => {
                let input = parse_input::<TableStatsInput>(id, arguments)?;
                self.schema
                    .get_table_stats(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::SearchColumns => {
                let input = parse_input::<SearchColumnsInput>(id, arguments)?;
                self.schema
                    .search_columns(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
            ToolId::GetDatabaseInfo => {
                let input = parse_input::<DatabaseInfoInput>(id, arguments)?;
                self.schema
                    .get_database_info(input)
                    .await
                    .and_then(|v| ok_json(&v))
            }
        }
    }
}

/// Deserialize tool arguments against the typed input struct. A missing
/// required field or a type mismatch is a validation error surfaced as a
/// tool result.
fn parse_input<T: serde::de::DeserializeOwned>(id: ToolId, arguments: JsonValue) -> DbResult<T> {
    serde_json::from_value(arguments).map_err(|e| {
        DbError::invalid_input(format!("Invalid arguments for tool '{}': {}", id.name(), e))
    })
}

fn ok_json<T: Serialize>(value: &T) -> DbResult<JsonValue> {
    serde_json::to_value(value)
        .map_err(|e| DbError::internal(format!("Failed to serialize tool result: {}", e)))
}

/// Serialize, with the serialization error itself as the fallback payload.
fn to_json<T: Serialize>(value: &T) -> Result<JsonValue, JsonValue> {
    serde_json::to_value(value).map_err(|e| {
        serde_json::json!({
            "success": false,
            "error": format!("Failed to serialize error payload: {}", e),
            "stage": "execution",
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, SslMode};
    use serde_json::json;

    fn test_dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(DbClient::new(ConnectionConfig {
            host: "127.0.0.1".into(),
            port: 1,
            user: "postgres".into(),
            password: "postgres".into(),
            database: "postgres".into(),
            sslmode: SslMode::Disable,
            statement_timeout_secs: 5,
            connect_timeout_secs: 2,
        }))
    }

    #[test]
    fn test_all_names_unique() {
        let mut names: Vec<_> = ToolId::ALL.iter().map(|id| id.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ToolId::ALL.len());
    }

    #[test]
    fn test_from_name_round_trip() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::from_name(id.name()), Some(id));
        }
        assert_eq!(ToolId::from_name("no_such_tool"), None);
    }

    #[test]
    fn test_registry_has_all_tools() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.definitions().len(), ToolId::ALL.len());
        assert!(registry.definitions().len() >= 4);
    }

    #[test]
    fn test_query_schema_requires_sql() {
        let registry = ToolRegistry::new();
        let query = registry
            .definitions()
            .iter()
            .find(|d| d.name == "query")
            .unwrap();
        let required = query.input_schema["required"]
            .as_array()
            .expect("query schema must list required fields");
        assert!(required.iter().any(|v| v == "sql"));
        assert_eq!(query.input_schema["properties"]["sql"]["type"], "string");
    }

    #[test]
    fn test_schema_argument_is_optional_with_default() {
        let registry = ToolRegistry::new();
        let list_tables = registry
            .definitions()
            .iter()
            .find(|d| d.name == "list_tables")
            .unwrap();
        let schema_prop = &list_tables.input_schema["properties"]["schema"];
        assert_eq!(schema_prop["default"], "public");
        // schema must not be listed as required
        let required = list_tables.input_schema["required"].as_array();
        assert!(
            required
                .map(|r| !r.iter().any(|v| v == "schema"))
                .unwrap_or(true)
        );
    }

    #[tokio::test]
    async fn test_dispatch_missing_required_argument() {
        let dispatcher = test_dispatcher();
        let payload = dispatcher.dispatch(ToolId::Query, json!({})).await;
        assert_eq!(payload["success"], false);
        assert_eq!(payload["stage"], "validation");
        assert!(payload["error"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn test_dispatch_rejected_sql_is_validation_stage() {
        let dispatcher = test_dispatcher();
        let payload = dispatcher
            .dispatch(ToolId::Query, json!({"sql": "DROP TABLE users"}))
            .await;
        assert_eq!(payload["success"], false);
        assert_eq!(payload["stage"], "validation");
        assert!(payload["error"].as_str().unwrap().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_dispatch_connection_failure_is_connection_stage() {
        let dispatcher = test_dispatcher();
        let payload = dispatcher
            .dispatch(ToolId::ListSchemas, json!({}))
            .await;
        assert_eq!(payload["success"], false);
        assert_eq!(payload["stage"], "connection");
    }
}

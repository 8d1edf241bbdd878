//! Schema introspection tools.
//!
//! Typed inputs and the handler for the catalog-backed tools. The `schema`
//! argument defaults to "public" everywhere it appears.

use crate::db::DbClient;
use crate::error::DbResult;
use crate::models::{
    ColumnMatch, ConstraintInfo, DatabaseInfo, FunctionEntry, IndexInfo, TableDescription,
    TableEntry, TableStats, ViewDefinition, ViewEntry,
};
use schemars::JsonSchema;
use serde::Deserialize;

fn default_schema() -> String {
    "public".to_string()
}

/// Input for list_schemas (no arguments).
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListSchemasInput {}

/// Input for list_tables.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Schema to list tables from.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for describe_table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Name of the table to describe.
    pub table_name: String,
    /// Schema containing the table.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for list_views.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListViewsInput {
    /// Schema to list views from.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for describe_view.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeViewInput {
    /// Name of the view to describe.
    pub view_name: String,
    /// Schema containing the view.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for list_functions.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListFunctionsInput {
    /// Schema to list functions from.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for list_indexes.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListIndexesInput {
    /// Table whose indexes to list.
    pub table_name: String,
    /// Schema containing the table.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for list_constraints.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListConstraintsInput {
    /// Table whose constraints to list.
    pub table_name: String,
    /// Schema containing the table.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for get_table_stats.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableStatsInput {
    /// Table to report statistics for.
    pub table_name: String,
    /// Schema containing the table.
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for search_columns.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchColumnsInput {
    /// Substring to match against column names (case-insensitive).
    pub search_term: String,
}

/// Input for get_database_info (no arguments).
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DatabaseInfoInput {}

/// Handler for the introspection tools.
#[derive(Debug, Clone)]
pub struct SchemaToolHandler {
    client: DbClient,
}

impl SchemaToolHandler {
    /// Create a new schema tool handler.
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    pub async fn list_schemas(&self, _input: ListSchemasInput) -> DbResult<Vec<String>> {
        self.client.list_schemas().await
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<Vec<TableEntry>> {
        self.client.list_tables(&input.schema).await
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<TableDescription> {
        self.client
            .describe_table(&input.table_name, &input.schema)
            .await
    }

    pub async fn list_views(&self, input: ListViewsInput) -> DbResult<Vec<ViewEntry>> {
        self.client.list_views(&input.schema).await
    }

    pub async fn describe_view(&self, input: DescribeViewInput) -> DbResult<ViewDefinition> {
        self.client
            .describe_view(&input.view_name, &input.schema)
            .await
    }

    pub async fn list_functions(&self, input: ListFunctionsInput) -> DbResult<Vec<FunctionEntry>> {
        self.client.list_functions(&input.schema).await
    }

    pub async fn list_indexes(&self, input: ListIndexesInput) -> DbResult<Vec<IndexInfo>> {
        self.client
            .list_indexes(&input.table_name, &input.schema)
            .await
    }

    pub async fn list_constraints(
        &self,
        input: ListConstraintsInput,
    ) -> DbResult<Vec<ConstraintInfo>> {
        self.client
            .list_constraints(&input.table_name, &input.schema)
            .await
    }

    pub async fn get_table_stats(&self, input: TableStatsInput) -> DbResult<TableStats> {
        self.client
            .get_table_stats(&input.table_name, &input.schema)
            .await
    }

    pub async fn search_columns(&self, input: SearchColumnsInput) -> DbResult<Vec<ColumnMatch>> {
        self.client.search_columns(&input.search_term).await
    }

    pub async fn get_database_info(&self, _input: DatabaseInfoInput) -> DbResult<DatabaseInfo> {
        self.client.get_database_info().await
    }
}

//! Schema introspection data models.
//!
//! Record types returned by the introspection tools. Field names match the
//! catalog terminology so results read naturally next to raw catalog
//! queries.

use serde::{Deserialize, Serialize};

/// A table (or view) entry from `list_tables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub table_name: String,
    /// "BASE TABLE", "VIEW", or "FOREIGN" as reported by the catalog.
    pub table_type: String,
}

/// A view entry from `list_views`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewEntry {
    pub table_name: String,
}

/// Definition of a single view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub view_name: String,
    pub schema: String,
    /// The SELECT body of the view; null for views the current role may not read.
    pub definition: Option<String>,
    pub is_updatable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_option: Option<String>,
}

/// A function entry from `list_functions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub function_name: String,
    /// "FUNCTION" or "PROCEDURE".
    pub routine_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

/// One column of a table, in catalog ordinal position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
}

/// A foreign key as a column -> referenced "table.column" pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub references: String,
}

/// Full structural description of a table: columns joined with the
/// primary-key set, plus the foreign keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescription {
    pub schema: String,
    pub table_name: String,
    pub columns: Vec<ColumnDescription>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

/// An index entry from `list_indexes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub index_name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
    /// Access method, e.g. "btree", "gin".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// A constraint entry from `list_constraints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintInfo {
    pub constraint_name: String,
    /// "PRIMARY KEY", "FOREIGN KEY", "UNIQUE", or "CHECK".
    pub constraint_type: String,
    pub definition: String,
}

/// Size and row-count statistics for a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    pub table_name: String,
    pub schema: String,
    /// Planner estimate from catalog statistics, not a live COUNT(*).
    /// -1 means the table has never been analyzed.
    pub row_count: i64,
    pub row_count_is_estimate: bool,
    /// Human-readable total size including indexes and TOAST.
    pub total_size: String,
    pub total_size_bytes: i64,
}

/// A column match from `search_columns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

/// Server and database facts from `get_database_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub database: String,
    pub version: String,
    pub user: String,
    pub encoding: String,
    pub size: String,
}

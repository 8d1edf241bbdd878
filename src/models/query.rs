//! Query-related data models.
//!
//! This module defines the result types for the `query` tool. A tool call
//! either succeeds with rows (or an affected-row count) or fails with an
//! error message and the stage that produced it. Never both.

use crate::error::DbError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Successful result of a SQL execution.
///
/// For read statements `rows` holds the (possibly truncated) result set and
/// `row_count` the number of rows the server returned before truncation.
/// For write statements `rows` is empty and `rows_affected` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub success: bool,
    /// Column names in server order. Empty when the statement returned no rows.
    pub columns: Vec<String>,
    /// Result rows as ordered column->value maps.
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Number of rows the server returned, counted before truncation.
    pub row_count: usize,
    /// True when rows were dropped to honor max_rows.
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    pub execution_time_ms: u64,
}

impl QueryOutcome {
    /// Build a read result from decoded rows, truncating to `max_rows` when
    /// provided. Truncation happens here, after execution - the SQL text is
    /// never rewritten.
    pub fn from_rows(
        columns: Vec<String>,
        mut rows: Vec<serde_json::Map<String, JsonValue>>,
        max_rows: Option<u32>,
        execution_time_ms: u64,
    ) -> Self {
        let row_count = rows.len();
        let truncated = match max_rows {
            Some(limit) if row_count > limit as usize => {
                rows.truncate(limit as usize);
                true
            }
            _ => false,
        };
        Self {
            success: true,
            columns,
            rows,
            row_count,
            truncated,
            rows_affected: None,
            execution_time_ms,
        }
    }

    /// Build a write result carrying the affected-row count.
    pub fn from_write(rows_affected: u64, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            truncated: false,
            rows_affected: Some(rows_affected),
            execution_time_ms,
        }
    }
}

/// Error payload returned as a normal tool result.
///
/// Tool-level failures never become transport errors; they are serialized
/// into the text content of a successful JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub success: bool,
    pub error: String,
    /// Which stage failed: "validation", "connection", or "execution".
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&DbError> for ErrorPayload {
    fn from(err: &DbError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            stage: err.stage().as_str().to_string(),
            suggestion: err.suggestion().map(str::to_string),
        }
    }
}

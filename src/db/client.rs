//! Database client for query execution.
//!
//! Every operation acquires its own connection, executes, and closes the
//! connection on every exit path - success, query failure, or connection
//! failure. There is no pooling and no state shared between calls; this
//! trades per-call latency for isolation between tool invocations.

use crate::config::ConnectionConfig;
use crate::db::types::{column_names, row_to_json_map};
use crate::error::{DbError, DbResult};
use crate::models::QueryOutcome;
use crate::tools::sql_validator::{self, StatementKind};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgConnection;
use sqlx::{ConnectOptions, Connection, Row};
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Result of the explain tool.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExplainOutcome {
    pub success: bool,
    /// Plan tree as produced by EXPLAIN (FORMAT JSON).
    pub plan: JsonValue,
    /// True when the statement was actually executed (ANALYZE mode).
    pub analyzed: bool,
    pub execution_time_ms: u64,
}

/// PostgreSQL client holding the immutable connection settings.
#[derive(Debug, Clone)]
pub struct DbClient {
    config: ConnectionConfig,
}

impl DbClient {
    /// Create a new client from connection settings.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Open a fresh connection, bounded by the configured connect timeout.
    ///
    /// Failures here are the connection class - unreachable host, refused
    /// port, bad credentials, missing database - and are reported distinctly
    /// from query-execution failures.
    pub(crate) async fn acquire(&self) -> DbResult<PgConnection> {
        let options = self.config.pg_connect_options();
        let connect_timeout = self.config.connect_timeout();

        match timeout(connect_timeout, options.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                let err = DbError::from(e);
                error!(
                    host = %self.config.host,
                    port = self.config.port,
                    stage = "connection",
                    error = %err,
                    "Failed to connect to database"
                );
                // Whatever sqlx reported, failing to establish the session is
                // a connection-stage error.
                match err {
                    DbError::Connection { .. } => Err(err),
                    other => Err(DbError::connection(
                        other.to_string(),
                        "Check the connection settings and that the server is reachable",
                    )),
                }
            }
            Err(_) => {
                error!(
                    host = %self.config.host,
                    port = self.config.port,
                    timeout_secs = self.config.connect_timeout_secs,
                    "Connection attempt timed out"
                );
                Err(DbError::connection(
                    format!(
                        "Connection to {}:{} timed out after {}s",
                        self.config.host, self.config.port, self.config.connect_timeout_secs
                    ),
                    "Check network connectivity and database server status",
                ))
            }
        }
    }

    /// Execute a SQL statement through the validator.
    ///
    /// Rejected statements fail fast without touching the database. Reads
    /// fetch the full result set and truncate in memory to `max_rows`;
    /// `row_count` reports the pre-truncation count. Writes run inside an
    /// explicit transaction: committed on success, rolled back on failure.
    pub async fn execute_query(
        &self,
        sql: &str,
        allow_write: bool,
        max_rows: Option<u32>,
    ) -> DbResult<QueryOutcome> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(DbError::invalid_input("SQL statement is required"));
        }

        let verdict = sql_validator::validate(sql, allow_write);
        if !verdict.allowed {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "statement is not allowed".to_string());
            debug!(reason = %reason, "Statement rejected by validator");
            return Err(DbError::rejected(first_word(sql), reason));
        }

        let start = Instant::now();
        let mut conn = self.acquire().await?;

        let result = match verdict.kind {
            StatementKind::Write => Self::run_write(&mut conn, sql, start).await,
            _ => Self::run_read(&mut conn, sql, max_rows, start).await,
        };

        // The connection is closed on every path before the result is
        // returned; a close failure is logged but never masks the outcome.
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error closing connection");
        }

        result
    }

    async fn run_read(
        conn: &mut PgConnection,
        sql: &str,
        max_rows: Option<u32>,
        start: Instant,
    ) -> DbResult<QueryOutcome> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(DbError::from)?;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let columns = rows.first().map(column_names).unwrap_or_default();
        let json_rows: Vec<_> = rows.iter().map(row_to_json_map).collect();

        info!(
            row_count = json_rows.len(),
            execution_time_ms, "Query executed"
        );
        Ok(QueryOutcome::from_rows(
            columns,
            json_rows,
            max_rows,
            execution_time_ms,
        ))
    }

    async fn run_write(
        conn: &mut PgConnection,
        sql: &str,
        start: Instant,
    ) -> DbResult<QueryOutcome> {
        let mut tx = conn.begin().await.map_err(DbError::from)?;

        match sqlx::query(sql).execute(&mut *tx).await {
            Ok(result) => {
                let rows_affected = result.rows_affected();
                tx.commit().await.map_err(DbError::from)?;
                let execution_time_ms = start.elapsed().as_millis() as u64;
                info!(rows_affected, execution_time_ms, "Write executed");
                Ok(QueryOutcome::from_write(rows_affected, execution_time_ms))
            }
            Err(e) => {
                // Roll back before the connection is released so a failed
                // write leaves nothing behind.
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "Rollback after failed write also failed");
                }
                Err(DbError::from(e))
            }
        }
    }

    /// Run EXPLAIN on a statement.
    ///
    /// Plain explain only plans, so read and write statements may both be
    /// examined; DDL and session statements are still rejected. With
    /// `analyze` true the statement is executed by the server - the
    /// validator therefore only passes read statements in that mode.
    pub async fn explain_query(&self, sql: &str, analyze: bool) -> DbResult<ExplainOutcome> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(DbError::invalid_input("SQL statement is required"));
        }

        let verdict = sql_validator::validate(sql, !analyze);
        if !verdict.allowed {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "statement is not allowed".to_string());
            return Err(DbError::rejected(first_word(sql), reason));
        }

        let explain_sql = if analyze {
            format!("EXPLAIN (ANALYZE, FORMAT JSON) {}", sql)
        } else {
            format!("EXPLAIN (FORMAT JSON) {}", sql)
        };

        let start = Instant::now();
        let mut conn = self.acquire().await?;

        let result = async {
            let row = sqlx::query(explain_sql.as_str())
                .fetch_one(&mut conn)
                .await
                .map_err(DbError::from)?;
            let plan: JsonValue = row.try_get(0).map_err(DbError::from)?;
            let execution_time_ms = start.elapsed().as_millis() as u64;
            info!(analyzed = analyze, execution_time_ms, "Explain executed");
            Ok(ExplainOutcome {
                success: true,
                plan,
                analyzed: analyze,
                execution_time_ms,
            })
        }
        .await;

        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error closing connection");
        }

        result
    }
}

/// Leading keyword of a statement, for error reporting.
fn first_word(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SslMode;

    fn unreachable_client() -> DbClient {
        DbClient::new(ConnectionConfig {
            host: "127.0.0.1".into(),
            // Port 1 is essentially never listening; connects fail fast.
            port: 1,
            user: "postgres".into(),
            password: "postgres".into(),
            database: "postgres".into(),
            sslmode: SslMode::Disable,
            statement_timeout_secs: 5,
            connect_timeout_secs: 2,
        })
    }

    #[tokio::test]
    async fn test_rejected_statement_never_connects() {
        // The unreachable host would make any connection attempt fail, so a
        // validation error here proves the database was never touched.
        let client = unreachable_client();
        let err = client
            .execute_query("DROP TABLE users", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_write_without_allow_write_is_validation_error() {
        let client = unreachable_client();
        let err = client
            .execute_query("DELETE FROM users", false, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert_eq!(err.stage().as_str(), "validation");
    }

    #[tokio::test]
    async fn test_empty_sql_is_invalid_input() {
        let client = unreachable_client();
        let err = client.execute_query("   ", false, None).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_connection_failure_is_connection_stage() {
        let client = unreachable_client();
        let err = client
            .execute_query("SELECT 1", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert_eq!(err.stage().as_str(), "connection");
    }

    #[tokio::test]
    async fn test_explain_analyze_rejects_writes() {
        let client = unreachable_client();
        let err = client
            .explain_query("DELETE FROM users", true)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_plain_explain_allows_write_statements() {
        // Validation passes for planning a DELETE; the failure must come
        // from the unreachable host, not the validator.
        let client = unreachable_client();
        let err = client
            .explain_query("DELETE FROM users", false)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[test]
    fn test_first_word() {
        assert_eq!(first_word("select * from t"), "SELECT");
        assert_eq!(first_word("  DROP TABLE t"), "DROP");
    }
}

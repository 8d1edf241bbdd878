//! Connection-failure behavior.
//!
//! With an unreachable database, every client operation must return a
//! connection-class error within the configured bound - never a panic and
//! never an indefinite hang.

use postgres_mcp::config::{ConnectionConfig, SslMode};
use postgres_mcp::db::DbClient;
use postgres_mcp::error::DbError;
use std::time::{Duration, Instant};

fn unreachable_client() -> DbClient {
    DbClient::new(ConnectionConfig {
        host: "127.0.0.1".into(),
        port: 1,
        user: "postgres".into(),
        password: "postgres".into(),
        database: "postgres".into(),
        sslmode: SslMode::Disable,
        statement_timeout_secs: 5,
        connect_timeout_secs: 2,
    })
}

fn assert_connection_error(err: DbError) {
    assert!(
        matches!(err, DbError::Connection { .. }),
        "expected connection error, got: {:?}",
        err
    );
}

/// Generous wall-clock bound: the connect timeout is 2s, so anything near
/// the 10s mark means the bound is not being enforced.
const BOUND: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_execute_query_bounded_failure() {
    let client = unreachable_client();
    let start = Instant::now();
    let err = client
        .execute_query("SELECT 1", false, None)
        .await
        .unwrap_err();
    assert_connection_error(err);
    assert!(start.elapsed() < BOUND);
}

#[tokio::test]
async fn test_every_introspection_operation_bounded_failure() {
    let client = unreachable_client();
    let start = Instant::now();

    assert_connection_error(client.list_schemas().await.unwrap_err());
    assert_connection_error(client.list_tables("public").await.unwrap_err());
    assert_connection_error(client.list_views("public").await.unwrap_err());
    assert_connection_error(client.describe_view("v", "public").await.unwrap_err());
    assert_connection_error(client.list_functions("public").await.unwrap_err());
    assert_connection_error(client.describe_table("t", "public").await.unwrap_err());
    assert_connection_error(client.list_indexes("t", "public").await.unwrap_err());
    assert_connection_error(client.list_constraints("t", "public").await.unwrap_err());
    assert_connection_error(client.get_table_stats("t", "public").await.unwrap_err());
    assert_connection_error(client.search_columns("id").await.unwrap_err());
    assert_connection_error(client.get_database_info().await.unwrap_err());

    // Eleven failed connects, each bounded individually; in practice a
    // refused port fails in milliseconds.
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_explain_bounded_failure() {
    let client = unreachable_client();
    let start = Instant::now();
    let err = client.explain_query("SELECT 1", false).await.unwrap_err();
    assert_connection_error(err);
    assert!(start.elapsed() < BOUND);
}

/// Writes enabled but unreachable: the failure is still the connection
/// stage, proving validation passed and nothing executed.
#[tokio::test]
async fn test_write_with_unreachable_host_fails_at_connection() {
    let client = unreachable_client();
    let err = client
        .execute_query("INSERT INTO t (id) VALUES (1)", true, None)
        .await
        .unwrap_err();
    assert_connection_error(err);
}

//! Integration tests against a real PostgreSQL server.
//!
//! These tests require a running database. Set TEST_POSTGRES_HOST (and
//! optionally TEST_POSTGRES_PORT/USER/PASSWORD/DB) to run them; they skip
//! otherwise. The connected role must be allowed to create and drop tables
//! in a scratch schema.

use postgres_mcp::config::{ConnectionConfig, SslMode};
use postgres_mcp::db::DbClient;
use sqlx::{ConnectOptions, Connection};

fn live_config() -> Option<ConnectionConfig> {
    let host = match std::env::var("TEST_POSTGRES_HOST") {
        Ok(host) => host,
        Err(_) => {
            eprintln!("Skipping test: TEST_POSTGRES_HOST not set");
            return None;
        }
    };
    let env_or = |key: &str, fallback: &str| std::env::var(key).unwrap_or_else(|_| fallback.into());
    Some(ConnectionConfig {
        host,
        port: env_or("TEST_POSTGRES_PORT", "5432").parse().unwrap_or(5432),
        user: env_or("TEST_POSTGRES_USER", "postgres"),
        password: env_or("TEST_POSTGRES_PASSWORD", "postgres"),
        database: env_or("TEST_POSTGRES_DB", "postgres"),
        sslmode: SslMode::Prefer,
        statement_timeout_secs: 30,
        connect_timeout_secs: 10,
    })
}

/// Create the fixture schema with a pk/fk pair of tables.
async fn setup_fixtures(config: &ConnectionConfig) {
    let mut conn = config.pg_connect_options().connect().await.unwrap();
    for sql in [
        "DROP SCHEMA IF EXISTS mcp_test CASCADE",
        "CREATE SCHEMA mcp_test",
        "CREATE TABLE mcp_test.authors (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ DEFAULT now()
        )",
        "CREATE TABLE mcp_test.books (
            id SERIAL PRIMARY KEY,
            author_id INT NOT NULL REFERENCES mcp_test.authors(id),
            title VARCHAR(200) NOT NULL,
            price NUMERIC(8,2)
        )",
        "INSERT INTO mcp_test.authors (name)
         SELECT 'author ' || i FROM generate_series(1, 10) AS i",
    ] {
        sqlx::query(sql).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
}

async fn author_count(client: &DbClient) -> serde_json::Value {
    client
        .execute_query("SELECT count(*) AS n FROM mcp_test.authors", false, None)
        .await
        .unwrap()
        .rows[0]["n"]
        .clone()
}

async fn teardown_fixtures(config: &ConnectionConfig) {
    let mut conn = config.pg_connect_options().connect().await.unwrap();
    sqlx::query("DROP SCHEMA IF EXISTS mcp_test CASCADE")
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
}

/// list_schemas includes "public" and excludes system schemas.
#[tokio::test]
async fn test_list_schemas_contains_public() {
    let Some(config) = live_config() else { return };
    let client = DbClient::new(config);

    let schemas = client.list_schemas().await.unwrap();
    assert!(schemas.iter().any(|s| s == "public"));
    assert!(!schemas.iter().any(|s| s == "pg_catalog"));
    assert!(!schemas.iter().any(|s| s == "information_schema"));
}

/// Every table returned by list_tables can be described without error.
#[tokio::test]
async fn test_list_then_describe_round_trip() {
    let Some(config) = live_config() else { return };
    setup_fixtures(&config).await;
    let client = DbClient::new(config.clone());

    let tables = client.list_tables("mcp_test").await.unwrap();
    assert!(!tables.is_empty());
    for table in &tables {
        let description = client
            .describe_table(&table.table_name, "mcp_test")
            .await
            .unwrap();
        assert_eq!(description.table_name, table.table_name);
        assert!(!description.columns.is_empty());
    }

    teardown_fixtures(&config).await;
}

/// describe_table joins primary and foreign keys correctly.
#[tokio::test]
async fn test_describe_table_keys() {
    let Some(config) = live_config() else { return };
    setup_fixtures(&config).await;
    let client = DbClient::new(config.clone());

    let books = client.describe_table("books", "mcp_test").await.unwrap();

    assert_eq!(books.primary_keys, vec!["id".to_string()]);
    for column in &books.columns {
        assert_eq!(
            column.is_primary_key,
            column.name == "id",
            "is_primary_key wrong for {}",
            column.name
        );
    }
    assert_eq!(books.foreign_keys.len(), 1);
    assert_eq!(books.foreign_keys[0].column, "author_id");
    assert_eq!(books.foreign_keys[0].references, "authors.id");

    // Column order follows ordinal position.
    let names: Vec<_> = books.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "author_id", "title", "price"]);

    teardown_fixtures(&config).await;
}

/// max_rows truncates after execution; row_count keeps the server count.
#[tokio::test]
async fn test_max_rows_truncation() {
    let Some(config) = live_config() else { return };
    setup_fixtures(&config).await;
    let client = DbClient::new(config.clone());

    let outcome = client
        .execute_query(
            "SELECT id, name FROM mcp_test.authors ORDER BY id",
            false,
            Some(2),
        )
        .await
        .unwrap();

    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.row_count, 10);
    assert!(outcome.truncated);
    assert_eq!(outcome.columns, vec!["id".to_string(), "name".to_string()]);

    teardown_fixtures(&config).await;
}

/// A write with allow_write=true commits and reports affected rows; the
/// default mode performs no mutation.
#[tokio::test]
async fn test_write_requires_opt_in() {
    let Some(config) = live_config() else { return };
    setup_fixtures(&config).await;
    let client = DbClient::new(config.clone());

    let rejected = client
        .execute_query(
            "INSERT INTO mcp_test.authors (name) VALUES ('rejected')",
            false,
            None,
        )
        .await;
    assert!(rejected.is_err());

    assert_eq!(author_count(&client).await, serde_json::json!(10));

    let outcome = client
        .execute_query(
            "INSERT INTO mcp_test.authors (name) VALUES ('accepted')",
            true,
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.rows_affected, Some(1));
    assert_eq!(author_count(&client).await, serde_json::json!(11));

    teardown_fixtures(&config).await;
}

/// explain_query returns a JSON plan; analyze mode executes reads only.
#[tokio::test]
async fn test_explain_plan() {
    let Some(config) = live_config() else { return };
    setup_fixtures(&config).await;
    let client = DbClient::new(config.clone());

    let outcome = client
        .explain_query("SELECT * FROM mcp_test.authors", false)
        .await
        .unwrap();
    assert!(outcome.plan.is_array());
    assert!(!outcome.analyzed);

    let analyzed = client
        .explain_query("SELECT * FROM mcp_test.authors", true)
        .await
        .unwrap();
    assert!(analyzed.analyzed);

    teardown_fixtures(&config).await;
}

/// Introspection extras: stats, indexes, constraints, column search.
#[tokio::test]
async fn test_extended_introspection() {
    let Some(config) = live_config() else { return };
    setup_fixtures(&config).await;
    let client = DbClient::new(config.clone());

    let stats = client.get_table_stats("authors", "mcp_test").await.unwrap();
    assert!(stats.row_count_is_estimate);
    assert!(stats.total_size_bytes > 0);

    let indexes = client.list_indexes("authors", "mcp_test").await.unwrap();
    assert!(indexes.iter().any(|i| i.is_primary));

    let constraints = client
        .list_constraints("books", "mcp_test")
        .await
        .unwrap();
    assert!(constraints.iter().any(|c| c.constraint_type == "PRIMARY KEY"));
    assert!(constraints.iter().any(|c| c.constraint_type == "FOREIGN KEY"));

    let matches = client.search_columns("author_id").await.unwrap();
    assert!(
        matches
            .iter()
            .any(|m| m.table_name == "books" && m.column_name == "author_id")
    );

    let info = client.get_database_info().await.unwrap();
    assert!(info.version.contains("PostgreSQL"));

    teardown_fixtures(&config).await;
}

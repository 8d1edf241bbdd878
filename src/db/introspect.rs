//! Catalog introspection operations.
//!
//! Each operation issues parameterized queries against the information
//! schema or the system catalogs, maps rows to the record types in
//! `models::schema`, and releases its connection on every exit path.
//!
//! SQL text lives in the `queries` submodule so the catalog surface the
//! server touches is visible in one place.

use crate::db::client::DbClient;
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDescription, ColumnMatch, ConstraintInfo, DatabaseInfo, ForeignKeyInfo, FunctionEntry,
    IndexInfo, TableDescription, TableEntry, TableStats, ViewDefinition, ViewEntry,
};
use sqlx::postgres::PgConnection;
use sqlx::Row;
use std::collections::HashSet;
use tracing::debug;

mod queries {
    /// System schemas are excluded everywhere a user-facing listing is built.
    pub const LIST_SCHEMAS: &str = r#"
        SELECT schema_name::text AS schema_name
        FROM information_schema.schemata
        WHERE schema_name NOT IN ('information_schema', 'pg_catalog', 'pg_toast')
        ORDER BY schema_name
        "#;

    pub const LIST_TABLES: &str = r#"
        SELECT table_name::text AS table_name, table_type::text AS table_type
        FROM information_schema.tables
        WHERE table_schema = $1
        ORDER BY table_name
        "#;

    pub const LIST_VIEWS: &str = r#"
        SELECT table_name::text AS table_name
        FROM information_schema.views
        WHERE table_schema = $1
        ORDER BY table_name
        "#;

    pub const DESCRIBE_VIEW: &str = r#"
        SELECT view_definition::text AS view_definition,
               is_updatable::text AS is_updatable,
               check_option::text AS check_option
        FROM information_schema.views
        WHERE table_schema = $1 AND table_name = $2
        "#;

    pub const LIST_FUNCTIONS: &str = r#"
        SELECT routine_name::text AS routine_name,
               routine_type::text AS routine_type,
               data_type::text AS return_type
        FROM information_schema.routines
        WHERE routine_schema = $1
        ORDER BY routine_name
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            column_name::text AS column_name,
            data_type::text AS data_type,
            is_nullable::text AS is_nullable,
            column_default::text AS column_default,
            character_maximum_length::int AS character_maximum_length,
            numeric_precision::int AS numeric_precision,
            numeric_scale::int AS numeric_scale
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
        "#;

    pub const PRIMARY_KEYS: &str = r#"
        SELECT kcu.column_name::text AS column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        WHERE tc.table_schema = $1
            AND tc.table_name = $2
            AND tc.constraint_type = 'PRIMARY KEY'
        ORDER BY kcu.ordinal_position
        "#;

    pub const FOREIGN_KEYS: &str = r#"
        SELECT
            kcu.column_name::text AS column_name,
            ccu.table_name::text AS foreign_table_name,
            ccu.column_name::text AS foreign_column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        JOIN information_schema.constraint_column_usage ccu
            ON ccu.constraint_name = tc.constraint_name
            AND ccu.table_schema = tc.table_schema
        WHERE tc.table_schema = $1
            AND tc.table_name = $2
            AND tc.constraint_type = 'FOREIGN KEY'
        "#;

    pub const LIST_INDEXES: &str = r#"
        SELECT
            i.relname::text AS index_name,
            array_agg(a.attname::text ORDER BY array_position(ix.indkey, a.attnum)) AS column_names,
            ix.indisunique AS is_unique,
            ix.indisprimary AS is_primary,
            am.amname::text AS index_method
        FROM pg_index ix
        JOIN pg_class i ON i.oid = ix.indexrelid
        JOIN pg_class t ON t.oid = ix.indrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        LEFT JOIN pg_am am ON am.oid = i.relam
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
        WHERE n.nspname = $1 AND t.relname = $2
        GROUP BY i.relname, ix.indisunique, ix.indisprimary, am.amname
        ORDER BY i.relname
        "#;

    pub const LIST_CONSTRAINTS: &str = r#"
        SELECT
            c.conname::text AS constraint_name,
            CASE c.contype
                WHEN 'p' THEN 'PRIMARY KEY'
                WHEN 'f' THEN 'FOREIGN KEY'
                WHEN 'u' THEN 'UNIQUE'
                WHEN 'c' THEN 'CHECK'
                ELSE upper(c.contype::text)
            END AS constraint_type,
            pg_get_constraintdef(c.oid) AS definition
        FROM pg_constraint c
        JOIN pg_class t ON t.oid = c.conrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        WHERE n.nspname = $1 AND t.relname = $2
        ORDER BY c.conname
        "#;

    /// reltuples is the planner estimate; a live COUNT(*) would be exact but
    /// unbounded on large tables.
    pub const TABLE_STATS: &str = r#"
        SELECT
            c.reltuples::bigint AS row_count,
            pg_total_relation_size(c.oid) AS total_size_bytes,
            pg_size_pretty(pg_total_relation_size(c.oid)) AS total_size
        FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1 AND c.relname = $2
        "#;

    pub const SEARCH_COLUMNS: &str = r#"
        SELECT table_schema::text AS table_schema,
               table_name::text AS table_name,
               column_name::text AS column_name,
               data_type::text AS data_type
        FROM information_schema.columns
        WHERE column_name ILIKE $1
            AND table_schema NOT IN ('information_schema', 'pg_catalog', 'pg_toast')
        ORDER BY table_schema, table_name, ordinal_position
        "#;

    pub const DATABASE_INFO: &str = r#"
        SELECT
            current_database()::text AS database,
            version() AS version,
            current_user::text AS db_user,
            pg_encoding_to_char(encoding)::text AS encoding,
            pg_size_pretty(pg_database_size(current_database())) AS size
        FROM pg_database
        WHERE datname = current_database()
        "#;
}

/// Run one introspection closure against a fresh connection, closing the
/// connection whatever the outcome.
macro_rules! with_connection {
    ($client:expr, $conn:ident, $body:expr) => {{
        let mut $conn = $client.acquire().await?;
        let result = $body;
        if let Err(e) = sqlx::Connection::close($conn).await {
            tracing::debug!(error = %e, "Error closing connection");
        }
        result
    }};
}

impl DbClient {
    /// List user schemas, ordered by name. System schemas are excluded.
    pub async fn list_schemas(&self) -> DbResult<Vec<String>> {
        with_connection!(self, conn, {
            fetch_schemas(&mut conn).await
        })
    }

    /// List tables (and views, as the catalog reports them) in a schema.
    pub async fn list_tables(&self, schema: &str) -> DbResult<Vec<TableEntry>> {
        with_connection!(self, conn, {
            fetch_tables(&mut conn, schema).await
        })
    }

    /// List views in a schema.
    pub async fn list_views(&self, schema: &str) -> DbResult<Vec<ViewEntry>> {
        with_connection!(self, conn, {
            fetch_views(&mut conn, schema).await
        })
    }

    /// Fetch the definition of a single view.
    pub async fn describe_view(&self, view_name: &str, schema: &str) -> DbResult<ViewDefinition> {
        with_connection!(self, conn, {
            fetch_view_definition(&mut conn, view_name, schema).await
        })
    }

    /// List functions and procedures in a schema.
    pub async fn list_functions(&self, schema: &str) -> DbResult<Vec<FunctionEntry>> {
        with_connection!(self, conn, {
            fetch_functions(&mut conn, schema).await
        })
    }

    /// Describe a table: columns in ordinal order joined in memory with the
    /// primary-key set, plus foreign keys as "table.column" references.
    pub async fn describe_table(
        &self,
        table_name: &str,
        schema: &str,
    ) -> DbResult<TableDescription> {
        with_connection!(self, conn, {
            fetch_table_description(&mut conn, table_name, schema).await
        })
    }

    /// List indexes on a table.
    pub async fn list_indexes(&self, table_name: &str, schema: &str) -> DbResult<Vec<IndexInfo>> {
        with_connection!(self, conn, {
            fetch_indexes(&mut conn, table_name, schema).await
        })
    }

    /// List constraints on a table with their type discriminator.
    pub async fn list_constraints(
        &self,
        table_name: &str,
        schema: &str,
    ) -> DbResult<Vec<ConstraintInfo>> {
        with_connection!(self, conn, {
            fetch_constraints(&mut conn, table_name, schema).await
        })
    }

    /// Estimated row count and total size for a table.
    pub async fn get_table_stats(&self, table_name: &str, schema: &str) -> DbResult<TableStats> {
        with_connection!(self, conn, {
            fetch_table_stats(&mut conn, table_name, schema).await
        })
    }

    /// Search column names across all user schemas.
    pub async fn search_columns(&self, search_term: &str) -> DbResult<Vec<ColumnMatch>> {
        with_connection!(self, conn, {
            fetch_column_matches(&mut conn, search_term).await
        })
    }

    /// Server version and database-level facts.
    pub async fn get_database_info(&self) -> DbResult<DatabaseInfo> {
        with_connection!(self, conn, {
            fetch_database_info(&mut conn).await
        })
    }
}

async fn fetch_schemas(conn: &mut PgConnection) -> DbResult<Vec<String>> {
    let rows = sqlx::query(queries::LIST_SCHEMAS)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    let schemas = rows
        .iter()
        .map(|row| row.get::<String, _>("schema_name"))
        .collect::<Vec<_>>();
    debug!(count = schemas.len(), "Listed schemas");
    Ok(schemas)
}

async fn fetch_tables(conn: &mut PgConnection, schema: &str) -> DbResult<Vec<TableEntry>> {
    let rows = sqlx::query(queries::LIST_TABLES)
        .bind(schema)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    let tables = rows
        .iter()
        .map(|row| TableEntry {
            table_name: row.get("table_name"),
            table_type: row.get("table_type"),
        })
        .collect::<Vec<_>>();
    debug!(count = tables.len(), schema, "Listed tables");
    Ok(tables)
}

async fn fetch_views(conn: &mut PgConnection, schema: &str) -> DbResult<Vec<ViewEntry>> {
    let rows = sqlx::query(queries::LIST_VIEWS)
        .bind(schema)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    Ok(rows
        .iter()
        .map(|row| ViewEntry {
            table_name: row.get("table_name"),
        })
        .collect())
}

async fn fetch_view_definition(
    conn: &mut PgConnection,
    view_name: &str,
    schema: &str,
) -> DbResult<ViewDefinition> {
    let row = sqlx::query(queries::DESCRIBE_VIEW)
        .bind(schema)
        .bind(view_name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?;

    match row {
        Some(row) => Ok(ViewDefinition {
            view_name: view_name.to_string(),
            schema: schema.to_string(),
            definition: row.get("view_definition"),
            is_updatable: row.get::<String, _>("is_updatable") == "YES",
            check_option: row
                .get::<Option<String>, _>("check_option")
                .filter(|v| v != "NONE"),
        }),
        None => Err(DbError::schema(
            format!("View '{}.{}' not found", schema, view_name),
            format!("{}.{}", schema, view_name),
        )),
    }
}

async fn fetch_functions(conn: &mut PgConnection, schema: &str) -> DbResult<Vec<FunctionEntry>> {
    let rows = sqlx::query(queries::LIST_FUNCTIONS)
        .bind(schema)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    Ok(rows
        .iter()
        .map(|row| FunctionEntry {
            function_name: row.get("routine_name"),
            routine_type: row.get("routine_type"),
            return_type: row.get("return_type"),
        })
        .collect())
}

async fn fetch_table_description(
    conn: &mut PgConnection,
    table_name: &str,
    schema: &str,
) -> DbResult<TableDescription> {
    let column_rows = sqlx::query(queries::DESCRIBE_COLUMNS)
        .bind(schema)
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;

    if column_rows.is_empty() {
        return Err(DbError::schema(
            format!("Table '{}.{}' not found", schema, table_name),
            format!("{}.{}", schema, table_name),
        ));
    }

    let pk_rows = sqlx::query(queries::PRIMARY_KEYS)
        .bind(schema)
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    let primary_keys: Vec<String> = pk_rows
        .iter()
        .map(|row| row.get::<String, _>("column_name"))
        .collect();
    let pk_set: HashSet<&str> = primary_keys.iter().map(String::as_str).collect();

    let fk_rows = sqlx::query(queries::FOREIGN_KEYS)
        .bind(schema)
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    let foreign_keys = fk_rows
        .iter()
        .map(|row| ForeignKeyInfo {
            column: row.get("column_name"),
            references: format!(
                "{}.{}",
                row.get::<String, _>("foreign_table_name"),
                row.get::<String, _>("foreign_column_name")
            ),
        })
        .collect::<Vec<_>>();

    let columns = column_rows
        .iter()
        .map(|row| {
            let name: String = row.get("column_name");
            let is_primary_key = pk_set.contains(name.as_str());
            ColumnDescription {
                is_primary_key,
                data_type: row.get("data_type"),
                nullable: row.get::<String, _>("is_nullable") == "YES",
                default: row.get("column_default"),
                max_length: row.get("character_maximum_length"),
                precision: row.get("numeric_precision"),
                scale: row.get("numeric_scale"),
                name,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        schema,
        table = table_name,
        columns = columns.len(),
        "Described table"
    );

    Ok(TableDescription {
        schema: schema.to_string(),
        table_name: table_name.to_string(),
        columns,
        primary_keys,
        foreign_keys,
    })
}

async fn fetch_indexes(
    conn: &mut PgConnection,
    table_name: &str,
    schema: &str,
) -> DbResult<Vec<IndexInfo>> {
    let rows = sqlx::query(queries::LIST_INDEXES)
        .bind(schema)
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    Ok(rows
        .iter()
        .map(|row| IndexInfo {
            index_name: row.get("index_name"),
            columns: row.get::<Vec<String>, _>("column_names"),
            is_unique: row.get("is_unique"),
            is_primary: row.get("is_primary"),
            method: row.get("index_method"),
        })
        .collect())
}

async fn fetch_constraints(
    conn: &mut PgConnection,
    table_name: &str,
    schema: &str,
) -> DbResult<Vec<ConstraintInfo>> {
    let rows = sqlx::query(queries::LIST_CONSTRAINTS)
        .bind(schema)
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    Ok(rows
        .iter()
        .map(|row| ConstraintInfo {
            constraint_name: row.get("constraint_name"),
            constraint_type: row.get("constraint_type"),
            definition: row.get("definition"),
        })
        .collect())
}

async fn fetch_table_stats(
    conn: &mut PgConnection,
    table_name: &str,
    schema: &str,
) -> DbResult<TableStats> {
    let row = sqlx::query(queries::TABLE_STATS)
        .bind(schema)
        .bind(table_name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?;

    match row {
        Some(row) => Ok(TableStats {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            row_count: row.get("row_count"),
            row_count_is_estimate: true,
            total_size: row.get("total_size"),
            total_size_bytes: row.get("total_size_bytes"),
        }),
        None => Err(DbError::schema(
            format!("Table '{}.{}' not found", schema, table_name),
            format!("{}.{}", schema, table_name),
        )),
    }
}

async fn fetch_column_matches(
    conn: &mut PgConnection,
    search_term: &str,
) -> DbResult<Vec<ColumnMatch>> {
    let pattern = format!("%{}%", escape_like(search_term));
    let rows = sqlx::query(queries::SEARCH_COLUMNS)
        .bind(pattern)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::from)?;
    Ok(rows
        .iter()
        .map(|row| ColumnMatch {
            table_schema: row.get("table_schema"),
            table_name: row.get("table_name"),
            column_name: row.get("column_name"),
            data_type: row.get("data_type"),
        })
        .collect())
}

async fn fetch_database_info(conn: &mut PgConnection) -> DbResult<DatabaseInfo> {
    let row = sqlx::query(queries::DATABASE_INFO)
        .fetch_one(&mut *conn)
        .await
        .map_err(DbError::from)?;
    Ok(DatabaseInfo {
        database: row.get("database"),
        version: row.get("version"),
        user: row.get("db_user"),
        encoding: row.get("encoding"),
        size: row.get("size"),
    })
}

/// Escape LIKE metacharacters so a search term matches literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

//! SQL statement validation for the query and explain tools.
//!
//! This module classifies a raw SQL string as an allowed read, an allowed
//! write, or a rejected statement. It is the sole gate in front of the
//! handlers that can execute arbitrary SQL: the database client refuses
//! execution on a rejected verdict before opening a connection.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) so that statement counting
//! and keyword detection go through a real tokenizer - a `;` inside a string
//! literal or a comment never counts as a statement separator, and no write
//! can slip past validation through formatting tricks.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// How a single statement was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, WITH ... SELECT, VALUES, EXPLAIN of a read
    Read,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    Write,
    /// DDL, permission, transaction, session, and procedure statements -
    /// never executable through the query tool
    Forbidden,
}

/// Validation decision for one SQL string. Recomputed per call.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub allowed: bool,
    pub kind: StatementKind,
    /// Populated when `allowed` is false.
    pub reason: Option<String>,
}

impl Verdict {
    fn allow(kind: StatementKind) -> Self {
        Self {
            allowed: true,
            kind,
            reason: None,
        }
    }

    fn deny(kind: StatementKind, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            kind,
            reason: Some(reason.into()),
        }
    }
}

/// Validate a SQL string for execution through the query tool.
///
/// With `allow_write` false (the default) only read statements pass. With
/// `allow_write` true, DML writes pass as well. Statements outside those two
/// categories - DDL, GRANT/REVOKE, transaction control, session control,
/// procedure calls - are rejected regardless of `allow_write`.
pub fn validate(sql: &str, allow_write: bool) -> Verdict {
    let dialect = PostgreSqlDialect {};

    let statements = match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements,
        Err(e) => {
            return Verdict::deny(
                StatementKind::Forbidden,
                format!("statement could not be parsed: {}", e),
            );
        }
    };

    if statements.is_empty() {
        return Verdict::deny(StatementKind::Forbidden, "empty SQL statement");
    }

    if statements.len() > 1 {
        return Verdict::deny(
            StatementKind::Forbidden,
            format!(
                "multiple statements are not supported ({} found); send one statement per call",
                statements.len()
            ),
        );
    }

    let (kind, operation) = classify_statement(&statements[0]);
    match kind {
        StatementKind::Read => Verdict::allow(StatementKind::Read),
        StatementKind::Write if allow_write => Verdict::allow(StatementKind::Write),
        StatementKind::Write => Verdict::deny(
            StatementKind::Write,
            format!(
                "{} is not allowed in read-only mode; set allow_write to true to run write statements",
                operation
            ),
        ),
        StatementKind::Forbidden => Verdict::deny(
            StatementKind::Forbidden,
            format!("{} is not allowed through this tool", operation),
        ),
    }
}

/// Classify a parsed statement.
fn classify_statement(stmt: &Statement) -> (StatementKind, &'static str) {
    match stmt {
        // Read-only statements
        Statement::Query(_) => (StatementKind::Read, "SELECT"),
        Statement::ExplainTable { .. } => (StatementKind::Read, "EXPLAIN TABLE"),

        // EXPLAIN inherits the classification of the statement it wraps:
        // EXPLAIN ANALYZE of a write executes the write.
        Statement::Explain { statement, .. } => {
            let (inner_kind, inner_name) = classify_statement(statement);
            match inner_kind {
                StatementKind::Read => (StatementKind::Read, "EXPLAIN"),
                other => (other, inner_name),
            }
        }

        // DML writes - allowed only when the caller opted into writes
        Statement::Insert(_) => (StatementKind::Write, "INSERT"),
        Statement::Update { .. } => (StatementKind::Write, "UPDATE"),
        Statement::Delete(_) => (StatementKind::Write, "DELETE"),
        Statement::Merge { .. } => (StatementKind::Write, "MERGE"),
        Statement::Copy { .. } => (StatementKind::Write, "COPY"),

        // DDL - never allowed
        Statement::CreateTable { .. } => (StatementKind::Forbidden, "CREATE TABLE"),
        Statement::CreateView { .. } => (StatementKind::Forbidden, "CREATE VIEW"),
        Statement::CreateIndex(_) => (StatementKind::Forbidden, "CREATE INDEX"),
        Statement::CreateSchema { .. } => (StatementKind::Forbidden, "CREATE SCHEMA"),
        Statement::CreateDatabase { .. } => (StatementKind::Forbidden, "CREATE DATABASE"),
        Statement::CreateSequence { .. } => (StatementKind::Forbidden, "CREATE SEQUENCE"),
        Statement::CreateType { .. } => (StatementKind::Forbidden, "CREATE TYPE"),
        Statement::CreateFunction { .. } => (StatementKind::Forbidden, "CREATE FUNCTION"),
        Statement::CreateProcedure { .. } => (StatementKind::Forbidden, "CREATE PROCEDURE"),
        Statement::CreateTrigger { .. } => (StatementKind::Forbidden, "CREATE TRIGGER"),
        Statement::CreateRole { .. } => (StatementKind::Forbidden, "CREATE ROLE"),
        Statement::CreateExtension { .. } => (StatementKind::Forbidden, "CREATE EXTENSION"),
        Statement::CreatePolicy { .. } => (StatementKind::Forbidden, "CREATE POLICY"),
        Statement::CreateVirtualTable { .. } => (StatementKind::Forbidden, "CREATE VIRTUAL TABLE"),
        Statement::AlterTable { .. } => (StatementKind::Forbidden, "ALTER TABLE"),
        Statement::AlterView { .. } => (StatementKind::Forbidden, "ALTER VIEW"),
        Statement::AlterIndex { .. } => (StatementKind::Forbidden, "ALTER INDEX"),
        Statement::AlterSchema { .. } => (StatementKind::Forbidden, "ALTER SCHEMA"),
        Statement::AlterRole { .. } => (StatementKind::Forbidden, "ALTER ROLE"),
        Statement::AlterType { .. } => (StatementKind::Forbidden, "ALTER TYPE"),
        Statement::AlterPolicy { .. } => (StatementKind::Forbidden, "ALTER POLICY"),
        Statement::Drop { .. } => (StatementKind::Forbidden, "DROP"),
        Statement::DropFunction { .. } => (StatementKind::Forbidden, "DROP FUNCTION"),
        Statement::DropProcedure { .. } => (StatementKind::Forbidden, "DROP PROCEDURE"),
        Statement::DropTrigger { .. } => (StatementKind::Forbidden, "DROP TRIGGER"),
        Statement::DropPolicy { .. } => (StatementKind::Forbidden, "DROP POLICY"),
        Statement::Truncate { .. } => (StatementKind::Forbidden, "TRUNCATE"),
        Statement::Comment { .. } => (StatementKind::Forbidden, "COMMENT"),

        // Permission statements - never allowed
        Statement::Grant { .. } => (StatementKind::Forbidden, "GRANT"),
        Statement::Revoke { .. } => (StatementKind::Forbidden, "REVOKE"),
        Statement::Deny { .. } => (StatementKind::Forbidden, "DENY"),

        // Transaction control - never allowed; every call is its own
        // transaction scope
        Statement::StartTransaction { .. } => (StatementKind::Forbidden, "BEGIN"),
        Statement::Commit { .. } => (StatementKind::Forbidden, "COMMIT"),
        Statement::Rollback { .. } => (StatementKind::Forbidden, "ROLLBACK"),
        Statement::Savepoint { .. } => (StatementKind::Forbidden, "SAVEPOINT"),
        Statement::ReleaseSavepoint { .. } => (StatementKind::Forbidden, "RELEASE SAVEPOINT"),

        // Procedure execution - never allowed (behavior cannot be verified)
        Statement::Call { .. } => (StatementKind::Forbidden, "CALL"),
        Statement::Execute { .. } => (StatementKind::Forbidden, "EXECUTE"),
        Statement::Prepare { .. } => (StatementKind::Forbidden, "PREPARE"),
        Statement::Deallocate { .. } => (StatementKind::Forbidden, "DEALLOCATE"),

        // Session and administrative control - never allowed
        Statement::Set(_) => (StatementKind::Forbidden, "SET"),
        Statement::Use(_) => (StatementKind::Forbidden, "USE"),
        Statement::Discard { .. } => (StatementKind::Forbidden, "DISCARD"),
        Statement::Vacuum { .. } => (StatementKind::Forbidden, "VACUUM"),
        Statement::Analyze { .. } => (StatementKind::Forbidden, "ANALYZE"),
        Statement::Kill { .. } => (StatementKind::Forbidden, "KILL"),
        Statement::LockTables { .. } => (StatementKind::Forbidden, "LOCK"),
        Statement::UnlockTables => (StatementKind::Forbidden, "UNLOCK"),
        Statement::LISTEN { .. } => (StatementKind::Forbidden, "LISTEN"),
        Statement::UNLISTEN { .. } => (StatementKind::Forbidden, "UNLISTEN"),
        Statement::NOTIFY { .. } => (StatementKind::Forbidden, "NOTIFY"),

        // Anything unrecognized is rejected, not guessed at
        _ => (StatementKind::Forbidden, "this statement"),
    }
}

//! Configuration handling for the PostgreSQL MCP Server.
//!
//! This module provides configuration management via CLI arguments and
//! environment variables. The connection settings are read once at process
//! start and treated as immutable afterwards.

use clap::{Parser, ValueEnum};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_PASSWORD: &str = "postgres";
pub const DEFAULT_DATABASE: &str = "postgres";
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SslMode {
    /// Never use SSL
    Disable,
    /// Try SSL, fall back to plaintext (default)
    #[default]
    Prefer,
    /// Require SSL, fail otherwise
    Require,
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disable => write!(f, "disable"),
            Self::Prefer => write!(f, "prefer"),
            Self::Require => write!(f, "require"),
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        }
    }
}

/// Server configuration parsed from CLI arguments and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "postgres-mcp",
    version,
    about = "MCP server exposing PostgreSQL query and introspection tools over stdio"
)]
pub struct Config {
    /// Database server host
    #[arg(long, env = "POSTGRES_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Database server port
    #[arg(long, env = "POSTGRES_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Database user
    #[arg(long, env = "POSTGRES_USER", default_value = DEFAULT_USER)]
    pub user: String,

    /// Database password (not logged)
    #[arg(long, env = "POSTGRES_PASSWORD", default_value = DEFAULT_PASSWORD, hide_env_values = true)]
    pub password: String,

    /// Database name
    #[arg(long, env = "POSTGRES_DB", default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// SSL mode: disable, prefer, or require
    #[arg(long, env = "POSTGRES_SSLMODE", value_enum, default_value_t = SslMode::Prefer)]
    pub sslmode: SslMode,

    /// Server-side statement timeout in seconds (0 disables the timeout)
    #[arg(long, env = "POSTGRES_STATEMENT_TIMEOUT", default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS)]
    pub statement_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[arg(long, env = "POSTGRES_CONNECT_TIMEOUT", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Log level filter (e.g. "info", "postgres_mcp=debug")
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

impl Config {
    /// Extract the immutable connection settings for the database client.
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            sslmode: self.sslmode,
            statement_timeout_secs: self.statement_timeout_secs,
            connect_timeout_secs: self.connect_timeout_secs,
        }
    }
}

/// Immutable database connection settings, threaded into the database client
/// at startup. Mutation after construction is not supported.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub sslmode: SslMode,
    pub statement_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl ConnectionConfig {
    /// Build sqlx connect options from these settings.
    ///
    /// The statement timeout is applied as a server-side session option so
    /// that long-running queries are bounded explicitly by the database, not
    /// by implicit client behavior.
    pub fn pg_connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.sslmode.into())
            .application_name("postgres-mcp");

        if self.statement_timeout_secs > 0 {
            options = options.options([(
                "statement_timeout",
                format!("{}s", self.statement_timeout_secs),
            )]);
        }

        options
    }

    /// Connection establishment timeout.
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connect_timeout_secs)
    }
}

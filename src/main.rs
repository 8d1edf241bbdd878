//! PostgreSQL MCP Server - Main entry point.
//!
//! Serves MCP (Model Context Protocol) tools for querying and introspecting
//! a PostgreSQL database over newline-delimited JSON-RPC on stdin/stdout.

use clap::Parser;
use postgres_mcp::config::Config;
use postgres_mcp::db::DbClient;
use postgres_mcp::protocol::McpServer;
use postgres_mcp::tools::{ToolDispatcher, ToolRegistry};
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr: stdout carries protocol frames and must stay clean.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        sslmode = %config.sslmode,
        "Starting postgres-mcp v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = DbClient::new(config.connection());
    let mut server = McpServer::new(ToolRegistry::new(), ToolDispatcher::new(client));

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = server.run(stdin, stdout) => {
            if let Err(e) = result {
                error!(error = %e, "Transport error");
                return Err(e.into());
            }
            info!("Transport closed, shutting down");
        }
        _ = wait_for_signal() => {
            info!("Shutdown signal received");
            // tokio::select! cannot interrupt a blocking stdin read, so
            // exit the process directly after logging.
            std::process::exit(0);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}

//! MCP server state machine and message loop.
//!
//! Lifecycle: `Uninitialized` accepts only `initialize`; the client's
//! `notifications/initialized` notification moves the session to `Serving`,
//! where `tools/list` and `tools/call` are accepted. The session ends when
//! the transport closes.
//!
//! Requests are read and answered one at a time in arrival order; a
//! pipelined client can send several requests before reading responses and
//! will get exactly one response per id, in order.

use crate::protocol::messages::{JsonRpcRequest, JsonRpcResponse, error_codes};
use crate::tools::{ToolDispatcher, ToolId, ToolRegistry};
use serde_json::{Value as JsonValue, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Protocol version advertised in the initialize response.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handshake yet; only `initialize` is accepted.
    Uninitialized,
    /// Handshake answered; waiting for the client's initialized notification.
    Initialized,
    /// Fully operational; tool methods are accepted.
    Serving,
    /// Transport closed or shutdown requested.
    Stopped,
}

/// The MCP protocol server.
pub struct McpServer {
    registry: ToolRegistry,
    dispatcher: ToolDispatcher,
    state: SessionState,
}

impl McpServer {
    /// Create a server with its registry and dispatcher. The registry is
    /// complete at this point; no tools can be registered later.
    pub fn new(registry: ToolRegistry, dispatcher: ToolDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
            state: SessionState::Uninitialized,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve messages until the reader reaches end of input.
    ///
    /// One JSON value per line in, one per line out. Blank lines are
    /// skipped. Responses are flushed immediately so a pipelining client
    /// never deadlocks on buffering.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_request(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("End of input, stopping");
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// Process a single raw line. Returns the serialized response, or None
    /// for notifications.
    pub async fn handle_request(&mut self, line: &str) -> Option<String> {
        let value: JsonValue = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Malformed JSON on transport");
                let response = JsonRpcResponse::error(
                    JsonValue::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                );
                return serde_json::to_string(&response).ok();
            }
        };

        let id = value.get("id").cloned().unwrap_or(JsonValue::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Structurally invalid request");
                let response = JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                );
                return serde_json::to_string(&response).ok();
            }
        };

        let response = self.handle_message(request).await?;
        serde_json::to_string(&response).ok()
    }

    /// Route one decoded message through the state machine.
    pub async fn handle_message(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, id = ?request.id, "Received message");

        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }

        let id = request.response_id();

        if !request.jsonrpc.is_empty() && request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                id,
                error_codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match (self.state, request.method.as_str()) {
            (SessionState::Uninitialized, "initialize") => {
                self.state = SessionState::Initialized;
                info!("Session initialized");
                JsonRpcResponse::success(id, self.initialize_result())
            }
            (_, "initialize") => JsonRpcResponse::error(
                id,
                error_codes::INVALID_REQUEST,
                "Server is already initialized",
            ),
            (SessionState::Serving, "tools/list") => JsonRpcResponse::success(
                id,
                json!({ "tools": self.registry.definitions() }),
            ),
            (SessionState::Serving, "tools/call") => self.handle_tool_call(id, request.params).await,
            (SessionState::Uninitialized | SessionState::Initialized, "tools/list" | "tools/call") => {
                JsonRpcResponse::error(
                    id,
                    error_codes::SERVER_NOT_INITIALIZED,
                    "Server not initialized: send initialize and the initialized notification first",
                )
            }
            (_, method) => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            ),
        };

        Some(response)
    }

    fn handle_notification(&mut self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                if self.state == SessionState::Initialized {
                    self.state = SessionState::Serving;
                    info!("Client ready, serving tool calls");
                } else {
                    warn!(state = ?self.state, "Unexpected initialized notification");
                }
            }
            other => {
                // Notifications never get a reply, even unknown ones.
                debug!(method = other, "Ignoring notification");
            }
        }
    }

    fn initialize_result(&self) -> JsonValue {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "postgres-mcp",
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    async fn handle_tool_call(&self, id: JsonValue, params: Option<JsonValue>) -> JsonRpcResponse {
        let params = params.unwrap_or(JsonValue::Null);

        let name = match params.get("name").and_then(JsonValue::as_str) {
            Some(name) => name,
            None => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "tools/call requires a 'name' parameter",
                );
            }
        };

        let tool_id = match ToolId::from_name(name) {
            Some(tool_id) => tool_id,
            None => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Unknown tool: {}", name),
                );
            }
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        info!(tool = name, "Dispatching tool call");
        let payload = self.dispatcher.dispatch(tool_id, arguments).await;

        JsonRpcResponse::success(id, wrap_text_content(&payload))
    }
}

/// Wrap a tool payload as the single text content item of a tools/call
/// result. Error payloads use the same shape; they are not transport
/// failures.
fn wrap_text_content(payload: &JsonValue) -> JsonValue {
    let text =
        serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    json!({
        "content": [
            {
                "type": "text",
                "text": text,
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, SslMode};
    use crate::db::DbClient;

    fn test_server() -> McpServer {
        let client = DbClient::new(ConnectionConfig {
            host: "127.0.0.1".into(),
            port: 1,
            user: "postgres".into(),
            password: "postgres".into(),
            database: "postgres".into(),
            sslmode: SslMode::Disable,
            statement_timeout_secs: 5,
            connect_timeout_secs: 2,
        });
        McpServer::new(ToolRegistry::new(), ToolDispatcher::new(client))
    }

    async fn roundtrip(server: &mut McpServer, line: &str) -> Option<JsonValue> {
        server
            .handle_request(line)
            .await
            .map(|s| serde_json::from_str(&s).unwrap())
    }

    async fn initialize(server: &mut McpServer) {
        roundtrip(
            server,
            r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#,
        )
        .await
        .unwrap();
        let none = roundtrip(
            server,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let mut server = test_server();
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "postgres-mcp");
        assert!(response["result"]["capabilities"]["tools"].is_object());
        assert_eq!(server.state(), SessionState::Initialized);
    }

    #[tokio::test]
    async fn test_request_before_initialize_is_protocol_error() {
        let mut server = test_server();
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
        )
        .await
        .unwrap();
        assert_eq!(
            response["error"]["code"],
            error_codes::SERVER_NOT_INITIALIZED
        );
    }

    #[tokio::test]
    async fn test_initialized_notification_enables_serving() {
        let mut server = test_server();
        initialize(&mut server).await;
        assert_eq!(server.state(), SessionState::Serving);
    }

    #[tokio::test]
    async fn test_double_initialize_rejected() {
        let mut server = test_server();
        initialize(&mut server).await;
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":9,"method":"initialize"}"#,
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_tools_list_returns_registry() {
        let mut server = test_server();
        initialize(&mut server).await;
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        )
        .await
        .unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert!(tools.len() >= 4);
        let query = tools.iter().find(|t| t["name"] == "query").unwrap();
        assert!(
            query["inputSchema"]["required"]
                .as_array()
                .unwrap()
                .iter()
                .any(|v| v == "sql")
        );
    }

    #[tokio::test]
    async fn test_unknown_method_is_method_not_found() {
        let mut server = test_server();
        initialize(&mut server).await;
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#,
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_tool_name_is_error_with_name() {
        let mut server = test_server();
        initialize(&mut server).await;
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"make_coffee"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
        assert!(
            response["error"]["message"]
                .as_str()
                .unwrap()
                .contains("make_coffee")
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let mut server = test_server();
        let response = roundtrip(&mut server, "{not json").await.unwrap();
        assert_eq!(response["error"]["code"], error_codes::PARSE_ERROR);
        assert_eq!(response["id"], JsonValue::Null);
    }

    #[tokio::test]
    async fn test_unknown_notification_gets_no_reply() {
        let mut server = test_server();
        let none = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#,
        )
        .await;
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_rejected_sql_is_tool_result_not_transport_error() {
        let mut server = test_server();
        initialize(&mut server).await;
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"query","arguments":{"sql":"DROP TABLE users"}}}"#,
        )
        .await
        .unwrap();
        assert!(response.get("error").is_none());
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let payload: JsonValue = serde_json::from_str(text).unwrap();
        assert_eq!(payload["success"], false);
        assert!(payload["error"].as_str().unwrap().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_tool_call_missing_name_is_invalid_params() {
        let mut server = test_server();
        initialize(&mut server).await;
        let response = roundtrip(
            &mut server,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{}}"#,
        )
        .await
        .unwrap();
        assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    }
}

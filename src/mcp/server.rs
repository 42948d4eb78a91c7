//! MCP stdio server: read loop and per-message handling.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::Instrument;

use super::codec::{read_message, write_message, Frame};
use super::protocol::{classify, Incoming, JsonRpcError, JsonRpcResponse};
use super::router;
use crate::tools::Dispatcher;
use crate::types::ServerConfig;

/// MCP server over a line-delimited JSON-RPC stream.
#[derive(Debug)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one session: read lines → handle → write responses, until EOF.
    ///
    /// Messages are handled one at a time in arrival order.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            "MCP session started (max_message_bytes={}, tools={})",
            self.config.max_message_bytes,
            self.dispatcher.list_tools().len(),
        );

        while let Some(frame) = read_message(&mut reader, self.config.max_message_bytes).await? {
            let response = match frame {
                Frame::Oversized(len) => {
                    tracing::warn!(
                        "Dropping {}-byte message (limit {})",
                        len,
                        self.config.max_message_bytes
                    );
                    Some(JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::parse_error(format!(
                            "message of {} bytes exceeds limit of {} bytes",
                            len, self.config.max_message_bytes
                        )),
                    ))
                }
                Frame::Message(line) => self.handle_line(&line).await,
            };

            if let Some(response) = response {
                timed_write(&mut writer, &response, self.config.write_timeout).await?;
            }
        }

        tracing::info!("stdin closed, ending MCP session");
        Ok(())
    }

    /// Handle one raw line. Returns `None` when no reply is due.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        if line.trim().is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("Unparseable message: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e),
                ));
            }
        };

        match classify(value) {
            Incoming::Request { id, method, params } => {
                let span = tracing::debug_span!("rpc", %method, id = %id);
                let outcome = router::route_request(&self.dispatcher, &method, params)
                    .instrument(span)
                    .await;
                Some(match outcome {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(error) => {
                        tracing::debug!("{} failed: {}", method, error.message);
                        JsonRpcResponse::error(id, error)
                    }
                })
            }
            Incoming::Notification { method } => {
                tracing::debug!("Notification {}", method);
                None
            }
            Incoming::Response => {
                tracing::debug!("Ignoring client response");
                None
            }
            Incoming::Invalid { id, error } => Some(JsonRpcResponse::error(id, error)),
        }
    }
}

/// Write a message with a timeout. A stalled consumer ends the session.
async fn timed_write<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
    timeout: Duration,
) -> std::io::Result<()> {
    tokio::time::timeout(timeout, write_message(writer, response))
        .await
        .map_err(|_| {
            tracing::warn!("Write timeout ({}s), ending session", timeout.as_secs());
            std::io::Error::new(std::io::ErrorKind::TimedOut, "write timeout")
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabase;
    use crate::mcp::protocol::{INVALID_REQUEST, PARSE_ERROR};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn server(max_message_bytes: usize) -> McpServer {
        let dispatcher = Dispatcher::with_database_tools(Arc::new(MockDatabase::new())).unwrap();
        McpServer::new(
            Arc::new(dispatcher),
            ServerConfig {
                max_message_bytes,
                ..ServerConfig::default()
            },
        )
    }

    async fn session(server: &McpServer, input: &str) -> Vec<Value> {
        let mut out = Vec::new();
        server.serve(input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = server(1024).handle_line("{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_notification_gets_no_reply() {
        let response = server(1024)
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert_eq!(response, None);
    }

    #[tokio::test]
    async fn test_session_answers_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            "\n",
            r#"{"jsonrpc":"1.0","id":2,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
        );
        let replies = session(&server(1024), input).await;
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0], json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
        assert_eq!(replies[1]["id"], 2);
        assert_eq!(replies[1]["error"]["code"], INVALID_REQUEST);
        assert_eq!(replies[2]["id"], 3);
    }

    #[tokio::test]
    async fn test_oversized_message_rejected_session_continues() {
        let big = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"pad":"{}"}}}}"#,
            "x".repeat(200)
        );
        let input = format!("{}\n{}\n", big, r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        let replies = session(&server(64), &input).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(replies[1]["id"], 2);
    }
}

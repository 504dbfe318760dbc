//! In-memory tool host for tests.
//!
//! Serves the MCP handshake, `tools/list` (optionally paginated) and
//! `tools/call` over a `tokio::io::duplex` pipe.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

use crate::error::Result;
use crate::protocol::{CallToolResult, JsonRpcError, LATEST_PROTOCOL_VERSION, Tool};
use crate::session::{Session, SessionOptions};

type CallHandler =
    dyn Fn(&str, &Map<String, Value>) -> std::result::Result<CallToolResult, (i32, String)>
        + Send
        + Sync;

/// Scripted tool host.
#[derive(Clone)]
pub struct MockToolHost {
    tools: Vec<Tool>,
    page_size: Option<usize>,
    protocol_version: String,
    initialize_result: Option<Value>,
    handler: Arc<CallHandler>,
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockToolHost {
    /// Host offering `tools`. By default a call to a listed tool echoes its
    /// arguments and a call to anything else is a JSON-RPC error.
    pub fn new(tools: Vec<Tool>) -> Self {
        let names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        let handler = move |name: &str, args: &Map<String, Value>| {
            if names.iter().any(|n| n == name) {
                Ok(CallToolResult::text(format!(
                    "{name} called with {}",
                    Value::Object(args.clone())
                )))
            } else {
                Err((-32602, format!("Unknown tool: {name}")))
            }
        };

        Self {
            tools,
            page_size: None,
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            initialize_result: None,
            handler: Arc::new(handler),
            counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Split `tools/list` into pages of `size` entries.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Answer `initialize` with `result` verbatim.
    pub fn with_initialize_result(mut self, result: Value) -> Self {
        self.initialize_result = Some(result);
        self
    }

    /// Replace the `tools/call` handler. `Err((code, message))` becomes a
    /// JSON-RPC error response.
    pub fn on_call<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Map<String, Value>) -> std::result::Result<CallToolResult, (i32, String)>
            + Send
            + Sync
            + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Number of messages received for `method` (requests and notifications).
    pub fn requests(&self, method: &str) -> usize {
        self.counts
            .lock()
            .map(|counts| counts.get(method).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Start serving. Returns the client's (reader, writer) ends.
    pub fn serve(&self) -> (DuplexStream, DuplexStream) {
        let (client_out, server_in) = duplex(256 * 1024);
        let (mut server_out, client_in) = duplex(256 * 1024);
        let host = self.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(server_in).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(message) = serde_json::from_str::<Value>(&line) else {
                    continue;
                };
                let Some(reply) = host.handle(&message) else {
                    continue;
                };
                let mut text = reply.to_string();
                text.push('\n');
                if server_out.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        (client_in, client_out)
    }

    /// Serve and run the client handshake.
    pub async fn connect(&self, options: SessionOptions) -> Result<Session> {
        let (reader, writer) = self.serve();
        Session::attach("mock", reader, writer, None, options).await
    }

    fn handle(&self, message: &Value) -> Option<Value> {
        let method = message.get("method")?.as_str()?;
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(method.to_string()).or_default() += 1;
        }

        let id = message.get("id")?.clone();
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        let outcome = match method {
            "initialize" => Ok(self.initialize_result.clone().unwrap_or_else(|| {
                json!({
                    "protocolVersion": self.protocol_version,
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": "mock-tool-host", "version": "0.0.0"}
                })
            })),
            "tools/list" => Ok(self.list_page(&params)),
            "tools/call" => self.call(&params),
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
        })
    }

    fn list_page(&self, params: &Value) -> Value {
        let Some(size) = self.page_size else {
            return json!({"tools": self.tools});
        };

        let start = params
            .get("cursor")
            .and_then(Value::as_str)
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0)
            .min(self.tools.len());
        let end = (start + size).min(self.tools.len());

        let mut page = json!({"tools": &self.tools[start..end]});
        if end < self.tools.len() {
            page["nextCursor"] = json!(end.to_string());
        }
        page
    }

    fn call(&self, params: &Value) -> std::result::Result<Value, JsonRpcError> {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let arguments = params
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match (self.handler)(name, &arguments) {
            Ok(result) => serde_json::to_value(result).map_err(|e| JsonRpcError {
                code: -32603,
                message: e.to_string(),
                data: None,
            }),
            Err((code, message)) => Err(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }
}

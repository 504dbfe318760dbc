//! A live connection to one tool host.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, TransportError};
use crate::launch::{LaunchCommand, Launcher, Runtimes};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, ListToolsParams,
    ListToolsResult, SUPPORTED_PROTOCOL_VERSIONS, Tool,
};
use crate::transport::StdioTransport;

/// Default bound on the initialize handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a single request after the handshake.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How long `close` waits for the host to exit on its own before killing it.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Timeouts applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Handle to an initialized tool host session.
pub struct Session {
    name: String,
    transport: StdioTransport,
    process: Mutex<Option<Child>>,
    options: SessionOptions,
    server_info: Option<InitializeResult>,
    closed: AtomicBool,
}

impl Session {
    /// Launch the tool host for `script` and complete the handshake.
    ///
    /// Fails with [`Error::UnsupportedScriptKind`] before anything is spawned
    /// when the suffix is not recognized. On handshake failure the process is
    /// shut down before the error is returned.
    pub async fn open(
        launcher: &impl Launcher,
        runtimes: &Runtimes,
        script: &Path,
        options: SessionOptions,
    ) -> Result<Self> {
        let command = LaunchCommand::for_script(runtimes, script)?;
        info!(%command, "launching tool host");

        let mut child = launcher.launch(&command).map_err(|source| Error::Spawn {
            command: command.to_string(),
            source,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            if let Err(e) = child.start_kill() {
                warn!(%command, error = %e, "failed to kill tool host without stdio");
            }
            return Err(Error::Spawn {
                command: command.to_string(),
                source: std::io::Error::other("failed to capture child stdio"),
            });
        };

        let name = script
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| command.to_string());

        Self::attach(name, stdout, stdin, Some(child), options).await
    }

    /// Run the handshake over an already connected byte stream.
    ///
    /// `child`, when given, is owned by the session and terminated on close.
    pub async fn attach(
        name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        child: Option<Child>,
        options: SessionOptions,
    ) -> Result<Self> {
        let mut session = Self {
            name: name.into(),
            transport: StdioTransport::new(reader, writer),
            process: Mutex::new(child),
            options,
            server_info: None,
            closed: AtomicBool::new(false),
        };

        let outcome = timeout(options.handshake_timeout, session.handshake()).await;
        match outcome {
            Ok(Ok(result)) => {
                info!(
                    session = %session.name,
                    server = %result.server_info.name,
                    protocol = %result.protocol_version,
                    "tool host initialized"
                );
                session.server_info = Some(result);
                Ok(session)
            }
            Ok(Err(e)) => {
                session.close().await;
                Err(Error::Launch(e))
            }
            Err(_) => {
                session.close().await;
                Err(Error::Launch(TransportError::Timeout(
                    options.handshake_timeout,
                )))
            }
        }
    }

    async fn handshake(&self) -> std::result::Result<InitializeResult, TransportError> {
        let params = serde_json::to_value(InitializeParams::default())?;
        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&result.protocol_version.as_str()) {
            return Err(TransportError::InvalidResponse(format!(
                "unsupported protocol version {}",
                result.protocol_version
            )));
        }

        self.transport
            .notify("notifications/initialized", None)
            .await?;
        Ok(result)
    }

    /// Get the session name (the script stem for launched hosts).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server info negotiated during the handshake.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// List the tools the host currently offers, in the host's order.
    ///
    /// Follows pagination cursors until the last page. The whole listing is
    /// bounded by the request timeout, and a cursor seen twice is an error.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.ensure_open()?;

        let limit = self.options.request_timeout;
        let tools = timeout(limit, self.list_tool_pages())
            .await
            .map_err(|_| Error::ListTools(TransportError::Timeout(limit)))?
            .map_err(Error::ListTools)?;

        debug!(session = %self.name, count = tools.len(), "listed tools");
        Ok(tools)
    }

    async fn list_tool_pages(&self) -> std::result::Result<Vec<Tool>, TransportError> {
        let mut tools = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = serde_json::to_value(ListToolsParams {
                cursor: cursor.clone(),
            })?;
            let page: ListToolsResult = self.request("tools/list", Some(params)).await?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(TransportError::InvalidResponse(format!(
                        "tools/list repeated cursor {next}"
                    )));
                }
                Some(next) => cursor = Some(next),
                None => return Ok(tools),
            }
        }
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` by the host is returned as
    /// [`Error::ToolFault`].
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult> {
        self.ensure_open()?;

        let invocation = |source: TransportError| Error::ToolInvocation {
            tool: name.to_string(),
            source,
        };

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let params = serde_json::to_value(params).map_err(|e| invocation(e.into()))?;

        debug!(session = %self.name, tool = name, "calling tool");
        let result: CallToolResult = self
            .timed_request("tools/call", Some(params))
            .await
            .map_err(invocation)?;

        if result.is_error {
            return Err(Error::ToolFault {
                tool: name.to_string(),
                message: result.text_content(),
            });
        }

        Ok(result)
    }

    /// Check if the host process is still running. Sessions without a
    /// process report `false` once closed.
    pub async fn is_running(&self) -> bool {
        let mut process = self.process.lock().await;
        match process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => !self.is_closed(),
        }
    }

    /// Close the channel, then stop the host process.
    ///
    /// The host gets `shutdown_grace` to exit after its input closes and is
    /// killed otherwise. Calling this again does nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!(session = %self.name, "close: already closed");
            return;
        }

        self.transport.close().await;

        let Some(mut child) = self.process.lock().await.take() else {
            info!(session = %self.name, "session closed");
            return;
        };

        match timeout(self.options.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(session = %self.name, %status, "tool host exited"),
            Ok(Err(e)) => warn!(session = %self.name, error = %e, "waiting for tool host failed"),
            Err(_) => {
                warn!(session = %self.name, "tool host did not exit, killing");
                if let Err(e) = child.kill().await {
                    warn!(session = %self.name, error = %e, "failed to kill tool host");
                }
            }
        }
        info!(session = %self.name, "session closed");
    }

    // --- Internal methods ---

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<R, TransportError> {
        let value = self.transport.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| TransportError::InvalidResponse(format!("{method}: {e}")))
    }

    async fn timed_request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<R, TransportError> {
        let limit = self.options.request_timeout;
        timeout(limit, self.request(method, params))
            .await
            .map_err(|_| TransportError::Timeout(limit))?
    }
}

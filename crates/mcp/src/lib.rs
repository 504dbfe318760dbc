//! MCP (Model Context Protocol) client library.
//!
//! This crate launches a tool host as a child process and talks to it over
//! line-delimited JSON-RPC on the child's stdio.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mcp::{ProcessLauncher, Runtimes, Session, SessionOptions};
//!
//! # async fn example() -> mcp::Result<()> {
//! let session = Session::open(
//!     &ProcessLauncher,
//!     &Runtimes::default(),
//!     Path::new("servers/weather.py"),
//!     SessionOptions::default(),
//! )
//! .await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("city".into(), "Paris".into());
//! let result = session.call_tool("get_weather", args).await?;
//! println!("{}", result.render());
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod launch;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod protocol;
mod session;
mod transport;

pub use error::{Error, Result, TransportError};
pub use launch::{INHERITED_ENV_VARS, LaunchCommand, Launcher, ProcessLauncher, Runtimes, ScriptKind};
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION,
    ListToolsParams, ListToolsResult, RequestId, ResourceContents, SUPPORTED_PROTOCOL_VERSIONS,
    ServerCapabilities, Tool, ToolContent,
};
pub use session::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, Session,
    SessionOptions,
};
pub use transport::{MAX_FRAME_SIZE, StdioTransport};

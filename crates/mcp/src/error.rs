//! MCP error types.

use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Failures of the framed channel itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server exited unexpectedly")]
    ServerExited,

    #[error("channel is closed")]
    Closed,

    #[error("timeout after {0:?} waiting for response")]
    Timeout(Duration),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Session-level errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The script suffix does not map to a known runtime.
    #[error("unsupported script kind: {} (expected a .py or .js file)", path.display())]
    UnsupportedScriptKind { path: PathBuf },

    /// The tool host process could not be started.
    #[error("failed to spawn tool host `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started but the handshake failed.
    #[error("handshake with tool host failed: {0}")]
    Launch(#[source] TransportError),

    /// Listing tools failed.
    #[error("failed to list tools: {0}")]
    ListTools(#[source] TransportError),

    /// A tool call failed at the channel level or the host reported a fault.
    #[error("tool call `{tool}` failed: {source}")]
    ToolInvocation {
        tool: String,
        #[source]
        source: TransportError,
    },

    /// The tool host reported an execution fault in its result.
    #[error("tool `{tool}` reported an error: {message}")]
    ToolFault { tool: String, message: String },

    /// The session has already been closed.
    #[error("session is closed")]
    Closed,
}

impl Error {
    /// Whether this error happened while starting the session.
    pub fn is_launch(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::Launch(_))
    }

    /// Whether this error came out of a single tool invocation.
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, Self::ToolInvocation { .. } | Self::ToolFault { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

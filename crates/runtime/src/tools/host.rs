//! Tool host trait.

use mcp::{CallToolResult, Tool};
use serde_json::{Map, Value};
use std::future::Future;

/// Trait for tool execution hosts.
///
/// This is the boundary between the model loop and side effects. A call that
/// fails, or that the host reports as an error, comes back as `Err`.
pub trait ToolHost: Send + Sync {
    /// Tools currently offered by the host.
    fn list_tools(&self) -> impl Future<Output = mcp::Result<Vec<Tool>>> + Send;

    /// Execute one tool with decoded arguments.
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = mcp::Result<CallToolResult>> + Send;
}

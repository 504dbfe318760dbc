//! MCP-backed tool host.

use super::ToolHost;
use mcp::{CallToolResult, Session, Tool};
use serde_json::{Map, Value};

impl ToolHost for Session {
    async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
        Session::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> mcp::Result<CallToolResult> {
        Session::call_tool(self, name, arguments).await
    }
}

impl<T: ToolHost> ToolHost for std::sync::Arc<T> {
    async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
        T::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> mcp::Result<CallToolResult> {
        T::call_tool(self, name, arguments).await
    }
}

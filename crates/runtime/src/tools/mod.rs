//! Tool discovery, argument decoding and execution hosts.

mod arguments;
mod host;
mod mcp_host;
mod registry;

pub use arguments::{ArgumentsError, ToolArguments};
pub use host::ToolHost;
pub use registry::{tool_schema, tool_schemas};

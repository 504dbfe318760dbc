//! Provider-agnostic model endpoint types.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, FinishReason, FunctionSchema, Message, ModelRequest, ModelResponse, Role,
    ToolCallRequest, ToolKind, ToolSchema, Usage,
};

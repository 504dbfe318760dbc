//! Tool-bridging chat runtime.
//!
//! This crate connects a chat-completions model to the tools of an MCP tool
//! host: it advertises the host's tools to the model, executes the tool calls
//! the model requests, and owns the host session for the life of the program.
//!
//! # Overview
//!
//! - **Backend**: a trait abstracting the model endpoint ([`OpenAiBackend`]).
//! - **ToolHost**: a trait over anything that lists and calls tools;
//!   [`mcp::Session`] implements it.
//! - **Dispatcher**: one query, one model call, then the requested tool calls
//!   in order.
//! - **Lifecycle**: owns the session and releases resources in reverse order.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mcp::{ProcessLauncher, Runtimes, SessionOptions};
//! use runtime::{Dispatcher, Lifecycle, OpenAiBackend};
//!
//! # async fn example() -> runtime::Result<()> {
//! let mut lifecycle = Lifecycle::new();
//! let (session, tools) = lifecycle
//!     .connect(
//!         &ProcessLauncher,
//!         &Runtimes::default(),
//!         Path::new("servers/weather.py"),
//!         SessionOptions::default(),
//!     )
//!     .await?;
//! println!("{} tools", tools.len());
//!
//! let backend = OpenAiBackend::builder("sk-...", "gpt-4o").build();
//! let dispatcher = Dispatcher::new(backend);
//! let answer = dispatcher
//!     .dispatch(&session, "What's the weather in Paris?")
//!     .await;
//! lifecycle.shutdown().await;
//! println!("{}", answer?);
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod error;
mod lifecycle;
pub mod model;
pub mod providers;
pub mod tools;

// Model layer (provider-agnostic)
pub use model::{
    Backend, FinishReason, Message, ModelError, ModelRequest, ModelResponse, Role,
    ToolCallRequest, ToolSchema, Usage,
};

// Providers
pub use providers::{OpenAiBackend, OpenAiBackendBuilder};

// Tools
pub use tools::{ArgumentsError, ToolArguments, ToolHost};

// Dispatch and lifecycle
pub use dispatch::{Dispatcher, Turn};
pub use lifecycle::{Lifecycle, ResourceStack};

// Error types
pub use error::{Error, Result};

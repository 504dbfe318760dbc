//! One query, one model call, and the tool calls it requested.

use crate::model::{Backend, Message, ModelRequest, ToolCallRequest};
use crate::tools::{ToolArguments, ToolHost, tool_schemas};
use crate::{Error, Result};
use mcp::CallToolResult;
use tracing::{debug, info};

/// Progress of a single dispatch. Nothing survives past `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Idle,
    AwaitingCompletion,
    ProcessingToolCalls,
    Done,
}

/// Everything one dispatch produced.
#[derive(Debug, Clone, Default)]
pub struct Turn {
    /// The user query this turn answered.
    pub query: String,
    /// Assistant text, if the model returned any.
    pub text: Option<String>,
    /// Executed tool calls with their results, in request order.
    pub tool_results: Vec<(ToolCallRequest, CallToolResult)>,
}

impl Turn {
    /// The printable answer: assistant text (if non-empty), then one
    /// `[Tool {name} result]` marker and rendered content per tool call,
    /// joined with newlines.
    pub fn render(&self) -> String {
        let mut fragments = Vec::with_capacity(1 + self.tool_results.len() * 2);
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            fragments.push(text.to_string());
        }
        for (call, result) in &self.tool_results {
            fragments.push(format!("[Tool {} result]", call.name));
            fragments.push(result.render());
        }
        fragments.join("\n")
    }
}

/// Sends queries to the model and executes the tool calls it asks for.
///
/// Each dispatch is stateless: the conversation is the single user query.
pub struct Dispatcher<B> {
    backend: B,
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one cycle and return the rendered answer.
    pub async fn dispatch(&self, host: &impl ToolHost, query: &str) -> Result<String> {
        Ok(self.run_turn(host, query).await?.render())
    }

    /// Run one cycle and return its parts.
    ///
    /// Tool calls run sequentially in the order the model listed them. The
    /// first failing call ends the cycle; calls before it have already run.
    pub async fn run_turn(&self, host: &impl ToolHost, query: &str) -> Result<Turn> {
        let mut state = DispatchState::Idle;
        debug!(?state, "dispatch: start");

        let messages = [Message::user(query)];
        let tools = host.list_tools().await?;
        let schemas = tool_schemas(&tools);

        state = DispatchState::AwaitingCompletion;
        debug!(?state, tools = tools.len(), "dispatch: calling model");
        let response = self
            .backend
            .call(ModelRequest {
                messages: &messages,
                tools: schemas.as_deref(),
            })
            .await?;

        let mut turn = Turn {
            query: query.to_string(),
            text: response.text,
            tool_results: Vec::with_capacity(response.tool_calls.len()),
        };

        if !response.tool_calls.is_empty() {
            state = DispatchState::ProcessingToolCalls;
            debug!(?state, calls = response.tool_calls.len(), "dispatch: running tools");
        }
        for call in response.tool_calls {
            let arguments =
                ToolArguments::parse(&call.arguments).map_err(|source| {
                    Error::MalformedToolArguments {
                        tool: call.name.clone(),
                        source,
                    }
                })?;

            info!(tool = %call.name, id = %call.id, "calling tool");
            let result = host.call_tool(&call.name, arguments.into_map()).await?;
            turn.tool_results.push((call, result));
        }

        state = DispatchState::Done;
        debug!(
            ?state,
            query = %turn.query,
            tool_results = turn.tool_results.len(),
            finish_reason = ?response.finish_reason,
            "dispatch: done"
        );
        Ok(turn)
    }
}

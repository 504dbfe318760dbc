use crate::model::ModelError;
use crate::tools::ArgumentsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tool(#[from] mcp::Error),

    #[error("malformed arguments for tool {tool}: {source}")]
    MalformedToolArguments {
        tool: String,
        #[source]
        source: ArgumentsError,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;

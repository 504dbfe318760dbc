//! Model endpoint adapters.
//!
//! Each provider implements the [`Backend`](crate::model::Backend) trait for
//! its specific API.

mod openai;

pub use openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder};

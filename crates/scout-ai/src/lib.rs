//! scout-ai: Unified LLM provider abstraction layer
//!
//! One canonical request/response/event shape for chat completions with tool
//! calling, plus adapters for Anthropic, OpenAI-compatible, Google, and
//! Ollama backends.

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use providers::{from_config, Provider};
pub use stream::{collect_response, EventStream, StreamEvent};
pub use types::*;

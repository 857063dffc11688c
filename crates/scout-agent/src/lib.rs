//! scout-agent: Agent loop for answering codebase questions
//!
//! An [`Agent`] takes a natural-language question, lets an LLM search the
//! working directory through four read-only tools (grep, glob, read, list),
//! and returns a grounded answer. Conversations are persisted so follow-up
//! questions keep their context.

pub mod agent;
pub mod conversation;
pub mod error;
pub mod prompt;
pub mod registry;
pub mod state;
pub mod storage;
pub mod tools;
mod truncation;

pub use agent::{Agent, AgentEvent, AgentOptions, Answer};
pub use conversation::{Conversation, StoredMessage};
pub use error::{Error, Result};
pub use prompt::ResourceInfo;
pub use registry::{Tool, ToolError, ToolOutput, ToolRegistry};
pub use state::LoopConfig;
pub use storage::{JsonStorage, Storage, StorageError};
pub use tools::default_registry;
pub use truncation::cleanup_old_outputs;

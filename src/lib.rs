//! A search-augmented conversational agent.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) and an OpenAI-compatible client.
//! - Web search (DuckDuckGo or Tavily) and clock tools behind a `ToolRegistry`.
//! - A `SearchAgent` that loops between the model and tools under a search budget,
//!   with a bounded conversation memory persisted as JSON.
//! - Front ends: an axum HTTP server (feature `server`) and the `search-chat` CLI.

pub mod agent;
pub mod config;
pub mod context;
mod error;
pub mod fallback;
pub mod llm;
pub mod memory;
pub mod message;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod tool;
pub mod tools;

pub use agent::{
    AgentSettings, Answer, ChatReply, SearchAgent, SearchBudget, DEFAULT_SYSTEM_PROMPT,
    EMPTY_ANSWER, ERROR_REPLY_PREFIX,
};
pub use config::AppConfig;
pub use context::{AppContext, SharedAgent};
pub use error::{Result, ScoutError};
pub use fallback::{parse_text_tool_call, MarkupToolCallParser, TextToolCallParser};
pub use llm::{LanguageModel, ModelCompletion, OpenAIClient, StubModel, ToolChoice};
pub use memory::ConversationMemory;
pub use message::{Message, Role, ToolArguments, ToolCall};
pub use storage::{ConversationStore, FileConversationStore};
pub use telemetry::init_tracing;
pub use tool::{Tool, ToolDescription, ToolRegistry};

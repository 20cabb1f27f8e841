//! Chat endpoint backend: relays a conversation to a hosted model and lets it
//! manage albums through a fixed set of tools.

pub mod llm;
pub mod mock;
pub mod openai;
pub mod service;
pub mod tools;

pub use llm::{ChatMessage, ChatRole, LlmClient, LlmError, ToolCall, ToolDefinition};
pub use mock::ScriptedLlmClient;
pub use openai::OpenAiClient;
pub use service::{ChatError, ChatRequest, ChatResponse, ChatService, HistoryMessage};
pub use tools::{AlbumTool, ToolError, ToolResult};

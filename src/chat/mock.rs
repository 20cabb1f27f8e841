//! Scripted model client for testing without network calls.

use super::llm::{ChatMessage, ChatRole, LlmClient, LlmError, ToolCall, ToolDefinition};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// A request as the client received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// Replays queued responses in order. Once the script runs out every call
/// fails with `LlmError::EmptyResponse`.
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<ChatMessage, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain assistant reply.
    pub fn reply(mut self, content: &str) -> Self {
        self.script
            .get_mut()
            .push_back(Ok(ChatMessage::text(ChatRole::Assistant, content)));
        self
    }

    /// Queue an assistant message requesting tool calls.
    pub fn tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.script.get_mut().push_back(Ok(ChatMessage {
            role: ChatRole::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }));
        self
    }

    /// Queue a failure.
    pub fn error(mut self, err: LlmError) -> Self {
        self.script.get_mut().push_back(Err(err));
        self
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError> {
        self.requests.lock().await.push(RecordedRequest {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        });
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

//! Chat-completions client for OpenAI and compatible APIs.

use super::llm::{ChatMessage, LlmClient, LlmError, ToolDefinition};
use crate::config::ChatConfig;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retry_elapsed: Duration,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

impl OpenAiClient {
    pub fn new(config: &ChatConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            max_retry_elapsed: MAX_RETRY_ELAPSED,
        }
    }

    /// Cap the total time spent retrying transient failures.
    pub fn with_max_retry_elapsed(mut self, max: Duration) -> Self {
        self.max_retry_elapsed = max;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn post_completion(
        &self,
        body: &CompletionRequest<'_>,
    ) -> Result<CompletionResponse, LlmError> {
        let url = self.endpoint();
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(LlmError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(LlmError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(LlmError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(LlmError::Http {
                    status: status.as_u16(),
                    message: truncate(&detail, 200),
                }));
            }

            response
                .json::<CompletionResponse>()
                .await
                .map_err(|e| backoff::Error::permanent(LlmError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage, LlmError> {
        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Requesting chat completion"
        );

        let body = CompletionRequest {
            model: &self.model,
            messages,
            tools: tools
                .iter()
                .map(|function| WireTool {
                    kind: "function",
                    function,
                })
                .collect(),
        };

        let response = self.post_completion(&body).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(LlmError::EmptyResponse)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

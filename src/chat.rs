use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{EditError, EditResult};
use crate::types::{ChatMessage, CompletionRequest};

pub const SERVICE: &str = "chat completion";

/// Hosted LLM that turns a conversation into the assistant's next message.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Returns the assistant message: text content, tool calls, or both.
    async fn complete(&self, request: CompletionRequest) -> EditResult<ChatMessage>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
}

impl OpenAiChat {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> EditResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EditError::upstream(SERVICE, format!("client setup failed: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(&self, request: CompletionRequest) -> EditResult<ChatMessage> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "calling chat completion"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| EditError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let err_msg = serde_json::from_str::<Value>(&raw)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(raw);
            return Err(EditError::upstream(
                SERVICE,
                format!("HTTP {}: {}", status, err_msg),
            ));
        }

        let body: CompletionBody = response
            .json()
            .await
            .map_err(|e| EditError::upstream(SERVICE, format!("unreadable response: {}", e)))?;

        let message = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .ok_or(EditError::EmptyCompletion { service: SERVICE })?;

        tracing::debug!(
            content = message.content.as_deref().unwrap_or(""),
            tool_calls = message.tool_calls.len(),
            "chat completion replied"
        );
        Ok(message)
    }
}

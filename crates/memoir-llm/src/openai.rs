//! OpenAI-compatible chat completions provider
//!
//! Works against any server that speaks `/chat/completions` (OpenAI, vLLM,
//! LiteLLM, llama.cpp server and friends).

use crate::gateway::ProviderRequest;
use crate::http::{build_client, post_json};
use crate::LlmError;
use memoir_domain::ChatMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider for OpenAI-compatible APIs
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    max_attempts: u32,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a provider rooted at `base_url` (e.g. `https://api.openai.com/v1`)
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            client: build_client(timeout)?,
            max_attempts: 1,
        })
    }

    /// Set the number of HTTP attempts per call
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Send one chat completion and return the first choice's text
    pub async fn complete(&self, request: &ProviderRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.options.max_tokens,
            temperature: request.options.temperature,
            response_format: request
                .options
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response: ChatCompletionResponse = post_json(
            &self.client,
            &url,
            self.api_key.as_deref(),
            &body,
            &request.model,
            self.max_attempts,
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response contained no choices".to_string()))
    }
}

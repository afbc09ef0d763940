//! Ollama Provider Implementation
//!
//! Talks to a local Ollama daemon through its `/api/chat` endpoint, so
//! system prompts and history keep their roles.
//!
//! # Examples
//!
//! ```no_run
//! use memoir_llm::OllamaProvider;
//! use std::time::Duration;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", Duration::from_secs(30)).unwrap();
//! ```

use crate::gateway::ProviderRequest;
use crate::http::{build_client, post_json};
use crate::LlmError;
use memoir_domain::ChatMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider for local inference
pub struct OllamaProvider {
    endpoint: String,
    client: reqwest::Client,
    max_attempts: u32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

impl OllamaProvider {
    /// Create a provider for the daemon at `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: build_client(timeout)?,
            max_attempts: 1,
        })
    }

    /// Set the number of HTTP attempts per call
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Send one chat request and return the assistant's text
    pub async fn complete(&self, request: &ProviderRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.endpoint);
        let opts = &request.options;
        let options = (opts.temperature.is_some() || opts.max_tokens.is_some()).then(|| OllamaOptions {
            temperature: opts.temperature,
            num_predict: opts.max_tokens,
        });

        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            format: opts.json_mode.then_some("json"),
            options,
        };

        let response: OllamaChatResponse =
            post_json(&self.client, &url, None, &body, &request.model, self.max_attempts).await?;
        Ok(response.message.content)
    }
}

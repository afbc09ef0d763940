//! The gateway: one call surface, typed outcomes, usage metrics

use crate::cache::CachingProvider;
use crate::config::{LlmConfig, LlmStyle};
use crate::json::parse_json_output;
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::telemetry::names;
use crate::{GatewayError, LlmError};
use memoir_domain::traits::{Telemetry, TokenCounter};
use memoir_domain::ChatMessage;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Sampling and output options for one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    /// Ask for a JSON object and parse it
    pub json_mode: bool,

    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// A gateway call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    /// User the call is made on behalf of (metric tag)
    pub user_id: Option<String>,

    /// Model override; the configured `best_llm_model` when absent
    pub model: Option<String>,

    /// The user-turn prompt
    pub prompt: String,

    /// Optional system prompt
    pub system_prompt: Option<String>,

    /// Earlier turns, oldest first
    pub history: Vec<ChatMessage>,

    /// Output options
    pub options: CompletionOptions,
}

impl CompletionRequest {
    /// Request with just a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Set prior turns
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Tag the call with its owning user
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Request structured (JSON) output
    pub fn json(mut self) -> Self {
        self.options.json_mode = true;
        self
    }

    /// Set output options
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }
}

/// A successful gateway result
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Raw provider text
    Text(String),
    /// Parsed JSON-mode output
    Json(Value),
}

impl Completion {
    /// Text output, if this was a text-mode call
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Completion::Text(text) => Some(text),
            Completion::Json(_) => None,
        }
    }

    /// Parsed output, if this was a JSON-mode call
    pub fn into_json(self) -> Option<Value> {
        match self {
            Completion::Json(value) => Some(value),
            Completion::Text(_) => None,
        }
    }
}

/// What a provider actually receives: a resolved model and a flat message list
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    /// Model identifier
    pub model: String,

    /// System prompt (if any), history, then the prompt as the final user turn
    pub messages: Vec<ChatMessage>,

    /// Output options
    pub options: CompletionOptions,
}

impl ProviderRequest {
    fn from_completion(model: String, request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage::new("system", system.clone()));
        }
        messages.extend(request.history.iter().cloned());
        messages.push(ChatMessage::user(request.prompt.clone()));

        Self {
            model,
            messages,
            options: request.options.clone(),
        }
    }
}

/// The closed set of completion providers
pub enum Provider {
    /// OpenAI-compatible chat completions API
    OpenAi(OpenAiProvider),
    /// Local Ollama daemon
    Ollama(OllamaProvider),
    /// Deterministic test double
    Mock(MockProvider),
}

impl Provider {
    /// Run one completion and return the raw text
    pub async fn complete(&self, request: &ProviderRequest) -> Result<String, LlmError> {
        match self {
            Provider::OpenAi(p) => p.complete(request).await,
            Provider::Ollama(p) => p.complete(request).await,
            Provider::Mock(p) => p.complete(request).await,
        }
    }

    /// Provider name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi(_) => "openai",
            Provider::Ollama(_) => "ollama",
            Provider::Mock(_) => "mock",
        }
    }
}

/// What the gateway calls: a provider, optionally behind a response cache
pub enum LlmBackend {
    /// Call the provider every time
    Direct(Provider),
    /// Serve repeated requests from memory
    Cached(CachingProvider),
}

impl LlmBackend {
    async fn complete(&self, request: &ProviderRequest) -> Result<String, LlmError> {
        match self {
            LlmBackend::Direct(provider) => provider.complete(request).await,
            LlmBackend::Cached(cache) => cache.complete(request).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LlmBackend::Direct(provider) => provider.name(),
            LlmBackend::Cached(cache) => cache.inner().name(),
        }
    }
}

/// Uniform completion surface over the configured backend
pub struct LlmGateway {
    backend: LlmBackend,
    model: String,
    project_id: String,
    timeout: Duration,
    counter: Arc<dyn TokenCounter>,
    telemetry: Arc<dyn Telemetry>,
}

/// Default wall-clock bound on one call
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

impl LlmGateway {
    /// Create a gateway over an explicit backend
    pub fn new(
        backend: LlmBackend,
        model: impl Into<String>,
        project_id: impl Into<String>,
        counter: Arc<dyn TokenCounter>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            project_id: project_id.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            counter,
            telemetry,
        }
    }

    /// Build the gateway described by `config`.
    ///
    /// # Errors
    ///
    /// Fails on an unknown `llm_style` or unusable provider settings. Callers
    /// treat this as fatal at startup.
    pub fn from_config(
        config: &LlmConfig,
        counter: Arc<dyn TokenCounter>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self, LlmError> {
        config.validate().map_err(LlmError::Config)?;
        let style: LlmStyle = config.llm_style.parse()?;

        let provider = match style {
            LlmStyle::OpenAi => Provider::OpenAi(
                OpenAiProvider::new(config.base_url_or_default(style), config.llm_api_key.clone(), config.timeout())?
                    .with_max_attempts(config.llm_max_attempts),
            ),
            LlmStyle::Ollama => Provider::Ollama(
                OllamaProvider::new(config.base_url_or_default(style), config.timeout())?
                    .with_max_attempts(config.llm_max_attempts),
            ),
            LlmStyle::Mock => Provider::Mock(MockProvider::default()),
        };

        let backend = if config.llm_response_cache {
            LlmBackend::Cached(CachingProvider::new(provider, config.llm_cache_capacity))
        } else {
            LlmBackend::Direct(provider)
        };

        info!(
            "LLM gateway ready: style={}, model={}, cache={}",
            style, config.best_llm_model, config.llm_response_cache
        );

        Ok(Self::new(
            backend,
            config.best_llm_model.clone(),
            config.project_id.clone(),
            counter,
            telemetry,
        )
        .with_timeout(config.timeout()))
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The default model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one completion.
    ///
    /// Provider failures and timeouts come back as `Unavailable`; JSON-mode
    /// output that does not parse comes back as `MalformedOutput`. Usage
    /// metrics are recorded for every call that reached the provider and
    /// returned.
    pub async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let provider_request = ProviderRequest::from_completion(model, &request);

        let start = Instant::now();
        let raw = match tokio::time::timeout(self.timeout, self.backend.complete(&provider_request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("Error in LLM completion ({}): {}", self.backend.name(), e);
                return Err(e.into());
            }
            Err(_) => {
                error!(
                    "LLM completion ({}) timed out after {:?}",
                    self.backend.name(),
                    self.timeout
                );
                return Err(GatewayError::Unavailable(format!(
                    "request timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        self.record_usage(&request, &raw, latency_ms);

        if !request.options.json_mode {
            return Ok(Completion::Text(raw));
        }

        match parse_json_output(&raw) {
            Some(value) => Ok(Completion::Json(value)),
            None => Err(GatewayError::MalformedOutput(
                "Failed to parse JSON response".to_string(),
            )),
        }
    }

    fn record_usage(&self, request: &CompletionRequest, raw: &str, latency_ms: f64) {
        let history = request
            .history
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let input = format!(
            "{}{}{}",
            request.prompt,
            request.system_prompt.as_deref().unwrap_or_default(),
            history
        );
        let in_tokens = self.counter.count_tokens(&input) as u64;
        let out_tokens = self.counter.count_tokens(raw) as u64;

        let mut tags = vec![("project_id", self.project_id.clone())];
        if let Some(user_id) = &request.user_id {
            tags.push(("user_id", user_id.clone()));
        }

        self.telemetry.record_counter(names::LLM_INPUT_TOKENS, in_tokens, &tags);
        self.telemetry.record_counter(names::LLM_OUTPUT_TOKENS, out_tokens, &tags);
        self.telemetry.record_counter(names::LLM_INVOCATIONS, 1, &tags);
        self.telemetry.record_histogram(names::LLM_LATENCY_MS, latency_ms, &tags);

        debug!(
            "LLM completion: {} tokens in, {} tokens out, {:.1}ms",
            in_tokens, out_tokens, latency_ms
        );
    }
}

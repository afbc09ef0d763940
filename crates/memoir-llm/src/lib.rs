//! Memoir LLM Gateway
//!
//! A uniform completion surface over one configured backing provider.
//!
//! # Architecture
//!
//! ```text
//! CompletionRequest → LlmGateway → LlmBackend ─┬─ Provider (openai | ollama | mock)
//!                          │                    └─ CachingProvider(Provider)
//!                          └→ usage metrics (tokens in/out, latency) → Telemetry
//! ```
//!
//! The provider is picked once, at startup, from the `llm_style` setting.
//! Unknown styles are a configuration error, never a runtime path.
//!
//! Every call returns a typed result: provider trouble becomes
//! [`GatewayError::Unavailable`], unparseable JSON-mode output becomes
//! [`GatewayError::MalformedOutput`].
//!
//! # Examples
//!
//! ```
//! use memoir_llm::{CompletionRequest, LlmBackend, LlmGateway, MockProvider, NoopTelemetry, Provider};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = MockProvider::new("- basic_info::name::Gus");
//! let gateway = LlmGateway::new(
//!     LlmBackend::Direct(Provider::Mock(provider.clone())),
//!     "test-model",
//!     "default",
//!     Arc::new(|text: &str| text.split_whitespace().count()),
//!     Arc::new(NoopTelemetry),
//! );
//!
//! let completion = gateway.complete(CompletionRequest::new("hello")).await.unwrap();
//! assert_eq!(completion.as_text(), Some("- basic_info::name::Gus"));
//! assert_eq!(provider.call_count(), 1);
//! # }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod gateway;
pub mod json;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod telemetry;
pub mod tokens;

mod http;

use thiserror::Error;

pub use cache::CachingProvider;
pub use config::{LlmConfig, LlmStyle};
pub use gateway::{Completion, CompletionOptions, CompletionRequest, LlmBackend, LlmGateway, Provider, ProviderRequest};
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use telemetry::{MetricEvent, MetricsTelemetry, NoopTelemetry, RecordingTelemetry};
pub use tokens::{default_counter, HeuristicCounter, TiktokenCounter};

/// Errors raised by providers and gateway construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// `llm_style` names no known provider
    #[error("Unsupported LLM style: {0}")]
    UnknownStyle(String),

    /// Invalid provider configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// Typed outcome of a failed gateway call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Provider failure: network error, non-2xx status, or timeout
    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    /// JSON mode was requested but the output did not parse
    #[error("Malformed LLM output: {0}")]
    MalformedOutput(String),
}

impl From<LlmError> for GatewayError {
    fn from(e: LlmError) -> Self {
        GatewayError::Unavailable(e.to_string())
    }
}

//! Gateway configuration

use crate::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default OpenAI-compatible API root
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Which backing provider the gateway wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmStyle {
    /// OpenAI-compatible chat completions
    OpenAi,
    /// Local Ollama daemon
    Ollama,
    /// Canned responses, for tests and dry runs
    Mock,
}

impl LlmStyle {
    /// Configuration spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmStyle::OpenAi => "openai",
            LlmStyle::Ollama => "ollama",
            LlmStyle::Mock => "mock",
        }
    }
}

impl fmt::Display for LlmStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmStyle {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmStyle::OpenAi),
            "ollama" => Ok(LlmStyle::Ollama),
            "mock" => Ok(LlmStyle::Mock),
            _ => Err(LlmError::UnknownStyle(s.to_string())),
        }
    }
}

/// Settings the gateway is built from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider selector: "openai", "ollama" or "mock"
    pub llm_style: String,

    /// Default model for every call
    pub best_llm_model: String,

    /// API root; the provider's public default when absent
    pub llm_base_url: Option<String>,

    /// Bearer token for OpenAI-compatible APIs
    pub llm_api_key: Option<String>,

    /// Wall-clock bound on one call
    pub llm_timeout_secs: u64,

    /// HTTP attempts per call, including the first
    pub llm_max_attempts: u32,

    /// Serve identical requests from memory
    pub llm_response_cache: bool,

    /// Entries kept by the response cache
    pub llm_cache_capacity: usize,

    /// Tag attached to every usage metric
    pub project_id: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_style: LlmStyle::OpenAi.as_str().to_string(),
            best_llm_model: "gpt-4o-mini".to_string(),
            llm_base_url: None,
            llm_api_key: None,
            llm_timeout_secs: 60,
            llm_max_attempts: 1,
            llm_response_cache: false,
            llm_cache_capacity: 256,
            project_id: "default".to_string(),
        }
    }
}

impl LlmConfig {
    /// Check value ranges (the style itself is checked when the gateway is built)
    pub fn validate(&self) -> Result<(), String> {
        if self.best_llm_model.trim().is_empty() {
            return Err("best_llm_model must not be empty".to_string());
        }
        if self.llm_timeout_secs == 0 {
            return Err("llm_timeout_secs must be greater than 0".to_string());
        }
        if self.llm_max_attempts == 0 {
            return Err("llm_max_attempts must be at least 1".to_string());
        }
        if self.llm_response_cache && self.llm_cache_capacity == 0 {
            return Err("llm_cache_capacity must be greater than 0 when the cache is on".to_string());
        }
        Ok(())
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Configured API root, or the style's public default
    pub fn base_url_or_default(&self, style: LlmStyle) -> String {
        match (&self.llm_base_url, style) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, LlmStyle::Ollama) => DEFAULT_OLLAMA_URL.to_string(),
            (None, _) => DEFAULT_OPENAI_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing() {
        assert_eq!("openai".parse::<LlmStyle>().unwrap(), LlmStyle::OpenAi);
        assert_eq!("Ollama".parse::<LlmStyle>().unwrap(), LlmStyle::Ollama);
        assert_eq!(" mock ".parse::<LlmStyle>().unwrap(), LlmStyle::Mock);
        assert!(matches!("anthropic".parse::<LlmStyle>(), Err(LlmError::UnknownStyle(_))));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = LlmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_validation_failures() {
        let config = LlmConfig {
            llm_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LlmConfig {
            best_llm_model: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LlmConfig {
            llm_response_cache: true,
            llm_cache_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.base_url_or_default(LlmStyle::OpenAi), DEFAULT_OPENAI_URL);
        assert_eq!(config.base_url_or_default(LlmStyle::Ollama), DEFAULT_OLLAMA_URL);

        let config = LlmConfig {
            llm_base_url: Some("http://gpu-box:8000/v1/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url_or_default(LlmStyle::OpenAi), "http://gpu-box:8000/v1");
    }

    #[test]
    fn test_partial_toml() {
        let config: LlmConfig = toml::from_str("llm_style = \"ollama\"\nbest_llm_model = \"llama3\"").unwrap();
        assert_eq!(config.llm_style, "ollama");
        assert_eq!(config.best_llm_model, "llama3");
        assert_eq!(config.llm_cache_capacity, 256);
    }
}

//! Configuration management for the CLI.
//!
//! One flat TOML file holds every setting. The per-crate config structs are
//! derived from it so each library validates its own slice.

use crate::error::{CliError, Result};
use memoir_buffer::BufferConfig;
use memoir_extractor::{ExtractionFormat, ExtractorConfig};
use memoir_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that supplies the API key when the file has none
pub const API_KEY_ENV: &str = "MEMOIR_LLM_API_KEY";

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoirConfig {
    /// Provider selector: "openai", "ollama" or "mock"
    pub llm_style: String,

    /// Model used for extraction
    pub best_llm_model: String,

    /// API root override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_base_url: Option<String>,

    /// Bearer token for OpenAI-compatible APIs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,

    /// Per-call timeout (seconds)
    pub llm_timeout_secs: u64,

    /// HTTP attempts per call
    pub llm_max_attempts: u32,

    /// Serve identical requests from memory
    pub llm_response_cache: bool,

    /// Response cache size
    pub llm_cache_capacity: usize,

    /// Tag on usage metrics
    pub project_id: String,

    /// Chat buffer flush threshold (tokens)
    pub max_chat_blob_buffer_token_size: usize,

    /// Document buffer flush threshold (tokens)
    pub max_document_blob_buffer_token_size: usize,

    /// "lines" or "json"
    pub extraction_format: ExtractionFormat,

    /// Existing entries shown to the model
    pub context_profiles_limit: usize,

    /// Bound on one extraction (seconds)
    pub extraction_timeout_secs: u64,

    /// SQLite file; ":memory:" keeps nothing
    pub database_path: String,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for MemoirConfig {
    fn default() -> Self {
        let llm = LlmConfig::default();
        let buffer = BufferConfig::default();
        let extractor = ExtractorConfig::default();
        Self {
            llm_style: llm.llm_style,
            best_llm_model: llm.best_llm_model,
            llm_base_url: llm.llm_base_url,
            llm_api_key: llm.llm_api_key,
            llm_timeout_secs: llm.llm_timeout_secs,
            llm_max_attempts: llm.llm_max_attempts,
            llm_response_cache: llm.llm_response_cache,
            llm_cache_capacity: llm.llm_cache_capacity,
            project_id: llm.project_id,
            max_chat_blob_buffer_token_size: buffer.max_chat_blob_buffer_token_size,
            max_document_blob_buffer_token_size: buffer.max_document_blob_buffer_token_size,
            extraction_format: extractor.extraction_format,
            context_profiles_limit: extractor.context_profiles_limit,
            extraction_timeout_secs: extractor.extraction_timeout_secs,
            database_path: "memoir.db".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl MemoirConfig {
    /// Default configuration file path (`~/.memoir/config.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".memoir").join("config.toml"))
    }

    /// Load the file at `path`; `Ok(None)` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(Self::from_toml(&contents)?))
    }

    /// Parse a TOML document; absent keys take their defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Fill `llm_api_key` from the environment value if the file left it unset.
    pub fn with_env_api_key(mut self, env_value: Option<String>) -> Self {
        if self.llm_api_key.is_none() {
            self.llm_api_key = env_value.filter(|key| !key.trim().is_empty());
        }
        self
    }

    /// Gateway settings.
    pub fn llm(&self) -> LlmConfig {
        LlmConfig {
            llm_style: self.llm_style.clone(),
            best_llm_model: self.best_llm_model.clone(),
            llm_base_url: self.llm_base_url.clone(),
            llm_api_key: self.llm_api_key.clone(),
            llm_timeout_secs: self.llm_timeout_secs,
            llm_max_attempts: self.llm_max_attempts,
            llm_response_cache: self.llm_response_cache,
            llm_cache_capacity: self.llm_cache_capacity,
            project_id: self.project_id.clone(),
        }
    }

    /// Buffer thresholds.
    pub fn buffer(&self) -> BufferConfig {
        BufferConfig {
            max_chat_blob_buffer_token_size: self.max_chat_blob_buffer_token_size,
            max_document_blob_buffer_token_size: self.max_document_blob_buffer_token_size,
        }
    }

    /// Extraction settings.
    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            context_profiles_limit: self.context_profiles_limit,
            extraction_timeout_secs: self.extraction_timeout_secs,
            extraction_format: self.extraction_format,
        }
    }

    /// Validate every derived slice.
    pub fn validate(&self) -> Result<()> {
        self.llm().validate().map_err(CliError::Config)?;
        self.buffer().validate().map_err(CliError::Config)?;
        self.extractor().validate().map_err(CliError::Config)?;
        if self.database_path.trim().is_empty() {
            return Err(CliError::Config("database_path must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MemoirConfig::default();
        assert_eq!(config.llm_style, "openai");
        assert_eq!(config.best_llm_model, "gpt-4o-mini");
        assert_eq!(config.max_chat_blob_buffer_token_size, 8192);
        assert_eq!(config.extraction_format, ExtractionFormat::Lines);
        assert_eq!(config.database_path, "memoir.db");
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "llm_style = \"ollama\"").unwrap();
        writeln!(file, "best_llm_model = \"llama3\"").unwrap();
        writeln!(file, "max_chat_blob_buffer_token_size = 512").unwrap();
        writeln!(file, "extraction_format = \"json\"").unwrap();

        let config = MemoirConfig::load(file.path()).unwrap().unwrap();
        assert_eq!(config.llm_style, "ollama");
        assert_eq!(config.llm().best_llm_model, "llama3");
        assert_eq!(config.buffer().max_chat_blob_buffer_token_size, 512);
        assert_eq!(config.buffer().max_document_blob_buffer_token_size, 8192);
        assert_eq!(config.extractor().extraction_format, ExtractionFormat::Json);
        assert_eq!(config.extractor().context_profiles_limit, 50);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(MemoirConfig::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(MemoirConfig::from_toml("llm_timeout_secs = \"soon\"").is_err());
        assert!(MemoirConfig::from_toml("extraction_format = \"xml\"").is_err());
    }

    #[test]
    fn test_env_api_key_fills_gap_only() {
        let config = MemoirConfig::default().with_env_api_key(Some("sk-env".to_string()));
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-env"));

        let config = MemoirConfig {
            llm_api_key: Some("sk-file".to_string()),
            ..MemoirConfig::default()
        }
        .with_env_api_key(Some("sk-env".to_string()));
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-file"));

        let config = MemoirConfig::default().with_env_api_key(Some("  ".to_string()));
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let config = MemoirConfig {
            max_document_blob_buffer_token_size: 0,
            ..MemoirConfig::default()
        };
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MemoirConfig {
            llm_style: "mock".to_string(),
            database_path: ":memory:".to_string(),
            ..MemoirConfig::default()
        };
        let parsed = MemoirConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}

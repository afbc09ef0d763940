//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway could not be built (unknown style, bad provider settings)
    #[error("LLM setup failed: {0}")]
    Llm(#[from] memoir_llm::LlmError),

    /// Database could not be opened or queried
    #[error("Storage error: {0}")]
    Store(#[from] memoir_store::StoreError),

    /// Insert or flush failed
    #[error("{0}")]
    Flush(#[from] memoir_buffer::FlushError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Line editor failure
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

//! Error types for the Extractor

use memoir_llm::GatewayError;
use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// The gateway could not reach its provider
    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    /// JSON-mode output did not parse or had the wrong shape
    #[error("Malformed LLM output: {0}")]
    MalformedOutput(String),

    /// Extraction timeout
    #[error("Extraction timeout after {0}s")]
    Timeout(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<GatewayError> for ExtractorError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(msg) => ExtractorError::Unavailable(msg),
            GatewayError::MalformedOutput(msg) => ExtractorError::MalformedOutput(msg),
        }
    }
}

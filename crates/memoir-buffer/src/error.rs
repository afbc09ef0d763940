//! Error types for buffering and flushing

use memoir_domain::{BlobCategory, RecordError};
use memoir_extractor::ExtractorError;
use thiserror::Error;

/// Errors that can occur while inserting or flushing.
///
/// Once a flush has drained its buffer, the drained records are consumed:
/// `GatewayUnavailable`, `MalformedOutput` and `Store` do not put them back.
/// They remain in the store's record archive.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlushError {
    /// The record was rejected before buffering
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    /// Another flush of the same buffer is running; retry later
    #[error("Buffer ({user_id}, {category}) is already flushing")]
    AlreadyFlushing {
        /// Buffer owner
        user_id: String,
        /// Buffer category
        category: BlobCategory,
    },

    /// The gateway failed or timed out
    #[error("LLM gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// JSON-mode extraction output was unusable
    #[error("Malformed LLM output: {0}")]
    MalformedOutput(String),

    /// Persistence failed
    #[error("Storage error: {0}")]
    Store(String),

    /// Runtime failure (blocking task panicked, poisoned lock)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ExtractorError> for FlushError {
    fn from(e: ExtractorError) -> Self {
        match e {
            ExtractorError::Unavailable(msg) => FlushError::GatewayUnavailable(msg),
            ExtractorError::Timeout(secs) => {
                FlushError::GatewayUnavailable(format!("extraction timed out after {}s", secs))
            }
            ExtractorError::MalformedOutput(msg) => FlushError::MalformedOutput(msg),
            ExtractorError::Config(msg) => FlushError::Internal(msg),
        }
    }
}

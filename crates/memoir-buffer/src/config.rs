//! Configuration for buffering and flush thresholds

use memoir_domain::BlobCategory;
use serde::{Deserialize, Serialize};

/// Per-category flush thresholds, in tokens
///
/// # Examples
///
/// ```
/// use memoir_buffer::BufferConfig;
/// use memoir_domain::BlobCategory;
///
/// let config = BufferConfig::default();
/// assert_eq!(config.threshold_for(BlobCategory::Chat), 8192);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// A chat buffer above this many tokens flushes on the next insert
    pub max_chat_blob_buffer_token_size: usize,

    /// Same for document buffers
    pub max_document_blob_buffer_token_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_chat_blob_buffer_token_size: 8192,
            max_document_blob_buffer_token_size: 8192,
        }
    }
}

impl BufferConfig {
    /// Threshold for `category`; categories that cannot be buffered never trigger
    pub fn threshold_for(&self, category: BlobCategory) -> usize {
        match category {
            BlobCategory::Chat => self.max_chat_blob_buffer_token_size,
            BlobCategory::Document => self.max_document_blob_buffer_token_size,
            BlobCategory::Image | BlobCategory::Transcript => usize::MAX,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chat_blob_buffer_token_size == 0 {
            return Err("max_chat_blob_buffer_token_size must be greater than 0".to_string());
        }
        if self.max_document_blob_buffer_token_size == 0 {
            return Err("max_document_blob_buffer_token_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }
}

//! Token counters
//!
//! [`TiktokenCounter`] counts with a real BPE vocabulary. [`HeuristicCounter`]
//! is the offline fallback: roughly four characters per token for English.

use crate::LlmError;
use memoir_domain::traits::TokenCounter;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// BPE counter backed by `tiktoken-rs`
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// The `o200k_base` vocabulary (GPT-4o family)
    pub fn o200k() -> Result<Self, LlmError> {
        let bpe = tiktoken_rs::o200k_base()
            .map_err(|e| LlmError::Config(format!("Failed to load o200k_base: {}", e)))?;
        Ok(Self { bpe })
    }

    /// The vocabulary tiktoken associates with `model`
    pub fn for_model(model: &str) -> Result<Self, LlmError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| LlmError::Config(format!("No tokenizer for model '{}': {}", model, e)))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Characters-per-token estimate
#[derive(Debug, Clone, Copy)]
pub struct HeuristicCounter {
    chars_per_token: f64,
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self { chars_per_token: 4.0 }
    }
}

impl HeuristicCounter {
    /// Counter with a custom ratio; non-positive ratios fall back to 4.0
    pub fn new(chars_per_token: f64) -> Self {
        if chars_per_token > 0.0 {
            Self { chars_per_token }
        } else {
            Self::default()
        }
    }
}

impl TokenCounter for HeuristicCounter {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        ((chars / self.chars_per_token).ceil() as usize).max(1)
    }
}

/// Best available counter for `model`: its own vocabulary, then `o200k_base`,
/// then the heuristic.
pub fn default_counter(model: &str) -> Arc<dyn TokenCounter> {
    if let Ok(counter) = TiktokenCounter::for_model(model) {
        return Arc::new(counter);
    }
    match TiktokenCounter::o200k() {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            warn!("{}; falling back to heuristic token counts", e);
            Arc::new(HeuristicCounter::default())
        }
    }
}

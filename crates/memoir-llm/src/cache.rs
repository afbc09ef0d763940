//! In-memory response cache
//!
//! Identical provider requests (model, messages, options) are answered from
//! memory. Only successful responses are kept; the least recently used
//! entry is evicted first.

use crate::gateway::{Provider, ProviderRequest};
use crate::LlmError;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Owned copy of everything that distinguishes one request from another
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    model: String,
    messages: Vec<(String, String)>,
    json_mode: bool,
    max_tokens: Option<u32>,
    temperature_bits: Option<u32>,
}

impl From<&ProviderRequest> for CacheKey {
    fn from(request: &ProviderRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| (m.role.clone(), m.content.clone()))
                .collect(),
            json_mode: request.options.json_mode,
            max_tokens: request.options.max_tokens,
            temperature_bits: request.options.temperature.map(f32::to_bits),
        }
    }
}

/// A provider wrapped with a bounded response cache
pub struct CachingProvider {
    inner: Provider,
    entries: Mutex<LruCache<CacheKey, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingProvider {
    /// Wrap `inner`, keeping at most `capacity` responses (at least one)
    pub fn new(inner: Provider, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped provider
    pub fn inner(&self) -> &Provider {
        &self.inner
    }

    /// Requests answered from memory
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Requests forwarded to the provider
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Answer from memory or forward to the provider
    pub async fn complete(&self, request: &ProviderRequest) -> Result<String, LlmError> {
        let key = CacheKey::from(request);
        let cached = self.lock().get(&key).cloned();
        if let Some(hit) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("LLM cache hit");
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let response = self.inner.complete(request).await?;
        self.lock().put(key, response.clone());

        Ok(response)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! Per-(user, category) token-counted record buffers

use dashmap::DashMap;
use memoir_domain::traits::TokenCounter;
use memoir_domain::{BlobCategory, RawRecord, RecordError};
use std::sync::Arc;

/// Buffer identity
pub type BufferKey = (String, BlobCategory);

#[derive(Debug, Default)]
struct PendingBuffer {
    records: Vec<RawRecord>,
    tokens: usize,
}

/// Records waiting for extraction, keyed by user and category.
///
/// Each key is its own shard entry, so appends for different users never
/// contend.
pub struct TokenBuffer {
    buffers: DashMap<BufferKey, PendingBuffer>,
    counter: Arc<dyn TokenCounter>,
}

impl TokenBuffer {
    /// Create an empty buffer set measuring size with `counter`
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            buffers: DashMap::new(),
            counter,
        }
    }

    /// Validate and append a record; returns the buffer's new token size
    pub fn append(&self, user_id: &str, record: RawRecord) -> Result<usize, RecordError> {
        let category = record.category();
        if !category.is_implemented() {
            return Err(RecordError::Unsupported(category));
        }
        record.validate()?;

        let tokens = self.counter.count_tokens(&record.render());
        let mut buffer = self.buffers.entry((user_id.to_string(), category)).or_default();
        buffer.records.push(record);
        buffer.tokens += tokens;
        Ok(buffer.tokens)
    }

    /// Buffered size in tokens
    pub fn capacity(&self, user_id: &str, category: BlobCategory) -> usize {
        self.buffers
            .get(&(user_id.to_string(), category))
            .map(|b| b.tokens)
            .unwrap_or(0)
    }

    /// Number of buffered records
    pub fn pending(&self, user_id: &str, category: BlobCategory) -> usize {
        self.buffers
            .get(&(user_id.to_string(), category))
            .map(|b| b.records.len())
            .unwrap_or(0)
    }

    /// Remove and return everything buffered for the key, oldest first
    pub fn snapshot_and_clear(&self, user_id: &str, category: BlobCategory) -> Vec<RawRecord> {
        self.buffers
            .remove(&(user_id.to_string(), category))
            .map(|(_, buffer)| buffer.records)
            .unwrap_or_default()
    }

    /// Keys that currently hold records
    pub fn keys(&self) -> Vec<BufferKey> {
        let mut keys: Vec<BufferKey> = self
            .buffers
            .iter()
            .filter(|entry| !entry.records.is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }
}

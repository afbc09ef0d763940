//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the extraction pipeline and its
//! collaborators. Implementations live in other crates.

use crate::{ProfileEntry, ProfileId, ProfileOp, RawRecord};

/// Trait for persisting profile facts and archived records
///
/// Implemented by the infrastructure layer (memoir-store)
pub trait ProfileStore {
    /// Error type for store operations
    type Error;

    /// Load every profile entry of a user
    fn load_profiles(&self, user_id: &str) -> Result<Vec<ProfileEntry>, Self::Error>;

    /// Apply one merge batch; the implementation picks the transaction boundary
    fn apply_profile_ops(&mut self, user_id: &str, ops: &[ProfileOp]) -> Result<(), Self::Error>;

    /// Durably keep records that left a buffer
    fn archive_records(&mut self, user_id: &str, records: &[RawRecord]) -> Result<(), Self::Error>;

    /// User-initiated removal of one entry; `Ok(false)` if it did not exist
    fn delete_profile(&mut self, user_id: &str, id: ProfileId) -> Result<bool, Self::Error>;
}

/// Token counting for a fixed model vocabulary
///
/// Any `Fn(&str) -> usize` closure is a counter, which keeps tests terse.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`
    fn count_tokens(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

/// Metric tags: `(key, value)` pairs
pub type Tags = [(&'static str, String)];

/// Best-effort metrics sink
///
/// Implementations must not block and must swallow their own failures.
pub trait Telemetry: Send + Sync {
    /// Add `value` to a monotonically increasing counter
    fn record_counter(&self, name: &str, value: u64, tags: &Tags);

    /// Record one observation of a distribution
    fn record_histogram(&self, name: &str, value: f64, tags: &Tags);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_token_counter() {
        let counter = |text: &str| text.split_whitespace().count();
        assert_eq!(counter.count_tokens("one two three"), 3);

        let boxed: Box<dyn TokenCounter> = Box::new(|text: &str| text.len());
        assert_eq!(boxed.count_tokens("abcd"), 4);
    }
}

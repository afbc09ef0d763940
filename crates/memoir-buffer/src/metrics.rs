//! Metrics collection for flush cycles

use memoir_domain::BlobCategory;
use std::collections::HashMap;

/// Counters collected across flush cycles
#[derive(Debug, Clone, Default)]
pub struct FlushMetrics {
    /// Completed flush cycles per category (empty drains included)
    pub cycles: HashMap<BlobCategory, usize>,

    /// Failed flush cycles
    pub failures: usize,

    /// Manual flushes refused because one was already running
    pub contended: usize,

    /// Records drained from buffers
    pub records_drained: usize,

    /// Profile entries created
    pub created: usize,

    /// Profile entries updated
    pub updated: usize,

    /// Profile entries deleted
    pub deleted: usize,

    /// Time spent inside flush cycles, in milliseconds
    pub total_flush_ms: u64,
}

impl FlushMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished cycle
    pub fn record_cycle(&mut self, category: BlobCategory, elapsed_ms: u64) {
        *self.cycles.entry(category).or_insert(0) += 1;
        self.total_flush_ms += elapsed_ms;
    }

    /// Record a failed cycle
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Record a refused flush
    pub fn record_contention(&mut self) {
        self.contended += 1;
    }

    /// Record what one successful cycle did
    pub fn record_changes(&mut self, drained: usize, created: usize, updated: usize, deleted: usize) {
        self.records_drained += drained;
        self.created += created;
        self.updated += updated;
        self.deleted += deleted;
    }

    /// Cycles across all categories
    pub fn total_cycles(&self) -> usize {
        self.cycles.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Flush Metrics Summary".to_string(),
            "=====================".to_string(),
            format!("Flush cycles: {}", self.total_cycles()),
        ];

        let mut categories: Vec<_> = self.cycles.iter().collect();
        categories.sort();
        for (category, count) in categories {
            lines.push(format!("  {}: {}", category, count));
        }

        lines.push(format!("Failures: {}", self.failures));
        lines.push(format!("Contended: {}", self.contended));
        lines.push(format!("Records drained: {}", self.records_drained));
        lines.push(format!(
            "Profiles: {} created, {} updated, {} deleted",
            self.created, self.updated, self.deleted
        ));
        lines.push(format!("Total flush time: {}ms", self.total_flush_ms));

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = FlushMetrics::new();
        assert_eq!(metrics.total_cycles(), 0);
        assert_eq!(metrics.failures, 0);
    }

    #[test]
    fn test_record_cycles() {
        let mut metrics = FlushMetrics::new();
        metrics.record_cycle(BlobCategory::Chat, 10);
        metrics.record_cycle(BlobCategory::Chat, 5);
        metrics.record_cycle(BlobCategory::Document, 1);

        assert_eq!(metrics.cycles[&BlobCategory::Chat], 2);
        assert_eq!(metrics.total_cycles(), 3);
        assert_eq!(metrics.total_flush_ms, 16);
    }

    #[test]
    fn test_reset() {
        let mut metrics = FlushMetrics::new();
        metrics.record_cycle(BlobCategory::Chat, 1);
        metrics.record_changes(3, 1, 1, 0);
        metrics.record_failure();

        metrics.reset();
        assert_eq!(metrics.total_cycles(), 0);
        assert_eq!(metrics.records_drained, 0);
        assert_eq!(metrics.failures, 0);
    }

    #[test]
    fn test_summary() {
        let mut metrics = FlushMetrics::new();
        metrics.record_cycle(BlobCategory::Chat, 120);
        metrics.record_changes(4, 2, 1, 0);
        metrics.record_contention();

        let summary = metrics.summary();
        assert!(summary.contains("Flush cycles: 1"));
        assert!(summary.contains("chat: 1"));
        assert!(summary.contains("Records drained: 4"));
        assert!(summary.contains("2 created, 1 updated, 0 deleted"));
        assert!(summary.contains("Contended: 1"));
        assert!(summary.contains("Total flush time: 120ms"));
    }
}

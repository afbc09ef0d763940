//! Usage metric sinks

use memoir_domain::traits::{Tags, Telemetry};
use std::sync::{Mutex, MutexGuard};

/// Metric names reported by the gateway
pub mod names {
    /// Prompt-side tokens per call
    pub const LLM_INPUT_TOKENS: &str = "llm_input_tokens";
    /// Completion-side tokens per call
    pub const LLM_OUTPUT_TOKENS: &str = "llm_output_tokens";
    /// Completed calls
    pub const LLM_INVOCATIONS: &str = "llm_invocations";
    /// Wall-clock latency per call, in milliseconds
    pub const LLM_LATENCY_MS: &str = "llm_latency_ms";
}

/// Forwards to the `metrics` facade; whatever recorder the host installed
/// (Prometheus exporter, none at all) receives the values.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTelemetry;

fn labels(tags: &Tags) -> Vec<metrics::Label> {
    tags.iter()
        .map(|(k, v)| metrics::Label::new(*k, v.clone()))
        .collect()
}

impl Telemetry for MetricsTelemetry {
    fn record_counter(&self, name: &str, value: u64, tags: &Tags) {
        metrics::counter!(name.to_string(), labels(tags)).increment(value);
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &Tags) {
        metrics::histogram!(name.to_string(), labels(tags)).record(value);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record_counter(&self, _name: &str, _value: u64, _tags: &Tags) {}

    fn record_histogram(&self, _name: &str, _value: f64, _tags: &Tags) {}
}

/// One recorded observation
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    /// Metric name
    pub name: String,
    /// Counter increment or histogram sample
    pub value: f64,
    /// Whether this came from `record_histogram`
    pub histogram: bool,
    /// Tags as owned pairs
    pub tags: Vec<(String, String)>,
}

/// Keeps every event in memory; used by tests and the REPL `metrics` command
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingTelemetry {
    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<MetricEvent> {
        self.lock().clone()
    }

    /// Sum of a counter across all tags
    pub fn counter_total(&self, name: &str) -> u64 {
        self.lock()
            .iter()
            .filter(|e| !e.histogram && e.name == name)
            .map(|e| e.value as u64)
            .sum()
    }

    /// Number of samples recorded for a histogram
    pub fn histogram_count(&self, name: &str) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.histogram && e.name == name)
            .count()
    }

    fn push(&self, name: &str, value: f64, histogram: bool, tags: &Tags) {
        self.lock().push(MetricEvent {
            name: name.to_string(),
            value,
            histogram,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MetricEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Telemetry for RecordingTelemetry {
    fn record_counter(&self, name: &str, value: u64, tags: &Tags) {
        self.push(name, value as f64, false, tags);
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &Tags) {
        self.push(name, value, true, tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_telemetry() {
        let telemetry = RecordingTelemetry::default();
        let tags = [("project_id", "p".to_string())];
        telemetry.record_counter(names::LLM_INVOCATIONS, 1, &tags);
        telemetry.record_counter(names::LLM_INVOCATIONS, 2, &tags);
        telemetry.record_histogram(names::LLM_LATENCY_MS, 12.5, &tags);

        assert_eq!(telemetry.counter_total(names::LLM_INVOCATIONS), 3);
        assert_eq!(telemetry.histogram_count(names::LLM_LATENCY_MS), 1);
        assert_eq!(telemetry.events()[0].tags, vec![("project_id".to_string(), "p".to_string())]);
    }

    #[test]
    fn test_metrics_facade_without_recorder() {
        // No recorder installed: the facade drops values silently
        let tags = [("project_id", "p".to_string())];
        MetricsTelemetry.record_counter(names::LLM_INPUT_TOKENS, 10, &tags);
        MetricsTelemetry.record_histogram(names::LLM_LATENCY_MS, 1.0, &tags);
    }
}

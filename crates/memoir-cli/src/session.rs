//! Wiring of store, gateway, extractor and coordinator for one process.

use crate::config::MemoirConfig;
use crate::error::Result;
use memoir_buffer::FlushCoordinator;
use memoir_domain::traits::{Tags, Telemetry};
use memoir_extractor::Extractor;
use memoir_llm::telemetry::names;
use memoir_llm::{default_counter, LlmGateway, MetricsTelemetry, RecordingTelemetry};
use memoir_store::SqliteStore;
use std::sync::Arc;
use tracing::info;

/// Forwards usage to the `metrics` facade and keeps a local copy for the
/// REPL `metrics` command.
#[derive(Debug, Default)]
pub struct SessionTelemetry {
    facade: MetricsTelemetry,
    local: RecordingTelemetry,
}

impl SessionTelemetry {
    /// One-line LLM usage summary
    pub fn summary(&self) -> String {
        format!(
            "LLM calls: {}, input tokens: {}, output tokens: {}",
            self.local.counter_total(names::LLM_INVOCATIONS),
            self.local.counter_total(names::LLM_INPUT_TOKENS),
            self.local.counter_total(names::LLM_OUTPUT_TOKENS),
        )
    }
}

impl Telemetry for SessionTelemetry {
    fn record_counter(&self, name: &str, value: u64, tags: &Tags) {
        self.facade.record_counter(name, value, tags);
        self.local.record_counter(name, value, tags);
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &Tags) {
        self.facade.record_histogram(name, value, tags);
        self.local.record_histogram(name, value, tags);
    }
}

/// Everything a command needs
pub struct Session {
    /// Buffers, flushes and profile access
    pub coordinator: FlushCoordinator<SqliteStore>,

    /// Usage collected since startup
    pub telemetry: Arc<SessionTelemetry>,
}

impl Session {
    /// Build from validated configuration.
    ///
    /// # Errors
    ///
    /// An unknown `llm_style` or an unopenable database; both are fatal.
    pub fn build(config: &MemoirConfig) -> Result<Self> {
        config.validate()?;

        let telemetry = Arc::new(SessionTelemetry::default());
        let counter = default_counter(&config.best_llm_model);
        let gateway = LlmGateway::from_config(&config.llm(), counter.clone(), telemetry.clone())?;
        let extractor = Extractor::new(Arc::new(gateway), config.extractor());
        let store = SqliteStore::new(&config.database_path)?;

        info!("Opened profile store at {}", config.database_path);

        Ok(Self {
            coordinator: FlushCoordinator::new(store, extractor, counter, config.buffer()),
            telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use memoir_domain::{BlobCategory, ChatMessage, RawRecord};

    fn mock_config() -> MemoirConfig {
        MemoirConfig {
            llm_style: "mock".to_string(),
            database_path: ":memory:".to_string(),
            ..MemoirConfig::default()
        }
    }

    #[test]
    fn test_unknown_style_is_fatal() {
        let config = MemoirConfig {
            llm_style: "carrier-pigeon".to_string(),
            ..mock_config()
        };
        assert!(matches!(Session::build(&config), Err(CliError::Llm(_))));
    }

    #[tokio::test]
    async fn test_mock_session_flushes() {
        let session = Session::build(&mock_config()).unwrap();
        let record = RawRecord::chat(vec![ChatMessage::user("hello, I'm Gus")]).unwrap();
        session.coordinator.insert("u1", record).await.unwrap();
        assert_eq!(session.coordinator.pending("u1", BlobCategory::Chat), 1);

        let report = session.coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
        assert_eq!(report.records, 1);
        assert!(report.llm_called);
        assert_eq!(session.coordinator.capacity("u1", BlobCategory::Chat), 0);
        assert!(session.telemetry.summary().starts_with("LLM calls: 1"));
    }
}

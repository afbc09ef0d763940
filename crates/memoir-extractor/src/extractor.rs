//! Core Extractor implementation

use crate::config::{ExtractionFormat, ExtractorConfig};
use crate::error::ExtractorError;
use crate::parser::{parse_fact_json, parse_fact_lines, ParseError, ParsedFacts};
use crate::prompt::PromptBuilder;
use crate::types::{ExtractionMetadata, ExtractionOutcome, ExtractionRequest};
use memoir_llm::{CompletionRequest, LlmGateway};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// The Extractor turns buffered records into profile deltas through the gateway
pub struct Extractor {
    gateway: Arc<LlmGateway>,
    config: ExtractorConfig,
}

impl Extractor {
    /// Create a new Extractor
    pub fn new(gateway: Arc<LlmGateway>, config: ExtractorConfig) -> Self {
        Self { gateway, config }
    }

    /// The active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Run one extraction.
    ///
    /// An empty record batch returns an empty outcome without calling the
    /// gateway. Output with no usable facts is not an error: the outcome
    /// carries zero deltas and the `parse_error`.
    pub async fn extract(&self, request: ExtractionRequest) -> Result<ExtractionOutcome, ExtractorError> {
        let start = Instant::now();
        let mut metadata = ExtractionMetadata {
            model_name: self.gateway.model().to_string(),
            records: request.records.len(),
            ..Default::default()
        };

        if request.records.is_empty() {
            debug!("No records for user '{}', skipping extraction", request.user_id);
            return Ok(ExtractionOutcome {
                metadata,
                ..Default::default()
            });
        }

        info!(
            "Starting extraction for user '{}': {} records, {} existing profiles",
            request.user_id,
            request.records.len(),
            request.existing_profiles.len()
        );

        let builder = PromptBuilder::new(&request.records)
            .with_existing_profiles(&request.existing_profiles, self.config.context_profiles_limit)
            .with_format(self.config.extraction_format);
        let mut completion_request = CompletionRequest::new(builder.user_prompt())
            .with_system_prompt(builder.system_prompt())
            .for_user(request.user_id.clone());
        if self.config.extraction_format == ExtractionFormat::Json {
            completion_request = completion_request.json();
        }

        debug!("Prompt length: {} chars", completion_request.prompt.len());

        let completion = timeout(self.config.extraction_timeout(), self.gateway.complete(completion_request))
            .await
            .map_err(|_| ExtractorError::Timeout(self.config.extraction_timeout_secs))??;
        metadata.llm_called = true;

        let record_count = request.records.len();
        let parsed = match self.config.extraction_format {
            ExtractionFormat::Json => {
                let value = completion
                    .into_json()
                    .ok_or_else(|| ExtractorError::MalformedOutput("expected JSON output".to_string()))?;
                Ok(parse_fact_json(&value, record_count).map_err(ExtractorError::MalformedOutput)?)
            }
            ExtractionFormat::Lines => {
                let text = completion.as_text().unwrap_or_default();
                debug!("LLM response length: {} chars", text.len());
                parse_fact_lines(text, record_count)
            }
        };

        metadata.processing_time_ms = start.elapsed().as_millis() as u64;

        let outcome = match parsed {
            Ok(ParsedFacts { deltas, skipped }) => {
                info!(
                    "Extraction complete for user '{}': {} facts, {} skipped",
                    request.user_id,
                    deltas.len(),
                    skipped
                );
                ExtractionOutcome {
                    deltas,
                    skipped,
                    parse_error: None,
                    metadata,
                }
            }
            Err(e) => {
                warn!("Extraction for user '{}' produced no facts: {}", request.user_id, e);
                let skipped = match &e {
                    ParseError::NoFacts { skipped } => *skipped,
                    ParseError::Empty => 0,
                };
                ExtractionOutcome {
                    deltas: Vec::new(),
                    skipped,
                    parse_error: Some(e),
                    metadata,
                }
            }
        };

        Ok(outcome)
    }
}

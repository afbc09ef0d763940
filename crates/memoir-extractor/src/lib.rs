//! Memoir Extractor
//!
//! Turns buffered records into profile changes.
//!
//! # Architecture
//!
//! ```text
//! Records + current profile → PromptBuilder → LlmGateway → parser → deltas
//!                                                                    │
//!                               existing profile → merge::apply ←────┘
//!                                                       │
//!                                                       └→ Vec<ProfileOp>
//! ```
//!
//! The extractor stops at deltas; [`merge::apply`] turns deltas into store
//! operations so the caller can choose when to persist them.
//!
//! # Example Usage
//!
//! ```no_run
//! use memoir_domain::{ChatMessage, RawRecord};
//! use memoir_extractor::{merge, ExtractionRequest, Extractor, ExtractorConfig};
//! use memoir_llm::{LlmBackend, LlmGateway, MockProvider, NoopTelemetry, Provider};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = LlmGateway::new(
//!     LlmBackend::Direct(Provider::Mock(MockProvider::new("- basic_info::name::Gus::[0]"))),
//!     "test-model",
//!     "default",
//!     Arc::new(|text: &str| text.len() / 4),
//!     Arc::new(NoopTelemetry),
//! );
//! let extractor = Extractor::new(Arc::new(gateway), ExtractorConfig::default());
//!
//! let records = vec![RawRecord::chat(vec![ChatMessage::user("hello, I'm Gus")])?];
//! let outcome = extractor.extract(ExtractionRequest::new("u1", records, vec![])).await?;
//! let ops = merge::apply("u1", &[], &outcome.deltas);
//!
//! println!("{} facts, {} ops", outcome.deltas.len(), ops.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
pub mod merge;
pub mod parser;
mod prompt;
mod types;


pub use config::{ExtractionFormat, ExtractorConfig};
pub use error::ExtractorError;
pub use extractor::Extractor;
pub use parser::{ParseError, ParsedFacts};
pub use prompt::PromptBuilder;
pub use types::{ExtractionMetadata, ExtractionOutcome, ExtractionRequest};

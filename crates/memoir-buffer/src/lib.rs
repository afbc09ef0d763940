//! Memoir Buffer
//!
//! Token-counted record buffers per (user, category) and the coordinator that
//! flushes them into profile memory.
//!
//! # Overview
//!
//! - **Buffering**: records accumulate until their buffer goes over its token
//!   threshold (`max_chat_blob_buffer_token_size`, default 8192)
//! - **Flushing**: drain, archive, extract facts through the LLM gateway,
//!   merge into the current profile, persist in one transaction
//! - **Serialization**: at most one flush per buffer at a time; different
//!   buffers flush concurrently
//! - **Metrics**: counters for cycles, failures and profile changes
//!
//! # Usage
//!
//! ```no_run
//! use memoir_buffer::{BufferConfig, FlushCoordinator};
//! use memoir_domain::{BlobCategory, ChatMessage, RawRecord};
//! use memoir_extractor::{Extractor, ExtractorConfig};
//! use memoir_llm::{LlmBackend, LlmGateway, MockProvider, NoopTelemetry, Provider};
//! use memoir_store::SqliteStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let counter = Arc::new(|text: &str| text.split_whitespace().count());
//! let gateway = LlmGateway::new(
//!     LlmBackend::Direct(Provider::Mock(MockProvider::new("- basic_info::name::Gus"))),
//!     "test-model",
//!     "default",
//!     counter.clone(),
//!     Arc::new(NoopTelemetry),
//! );
//! let coordinator = FlushCoordinator::new(
//!     SqliteStore::new("memoir.db")?,
//!     Extractor::new(Arc::new(gateway), ExtractorConfig::default()),
//!     counter,
//!     BufferConfig::default(),
//! );
//!
//! let record = RawRecord::chat(vec![ChatMessage::user("hello, I'm Gus")])?;
//! coordinator.insert("u1", record).await?;
//!
//! let report = coordinator.flush("u1", BlobCategory::Chat).await?;
//! println!("{} created", report.created);
//! println!("\n{}", coordinator.metrics().summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod buffer;
mod config;
mod coordinator;
mod error;
mod metrics;

pub use buffer::{BufferKey, TokenBuffer};
pub use config::BufferConfig;
pub use coordinator::{AutoFlush, FlushCoordinator, FlushReport, InsertReceipt};
pub use error::FlushError;
pub use metrics::FlushMetrics;

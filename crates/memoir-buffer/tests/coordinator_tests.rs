//! Integration tests for the flush coordinator
//!
//! These run the full insert → flush → extract → merge → persist path against
//! an in-memory SQLite store and the mock LLM provider.

use memoir_buffer::{AutoFlush, BufferConfig, FlushCoordinator, FlushError};
use memoir_domain::traits::{ProfileStore, TokenCounter};
use memoir_domain::{BlobCategory, ChatMessage, ProfileEntry, ProfileId, ProfileOp, RawRecord, RecordPayload};
use memoir_extractor::{Extractor, ExtractorConfig, ParseError};
use memoir_llm::{LlmBackend, LlmGateway, MockProvider, NoopTelemetry, Provider};
use memoir_store::SqliteStore;
use std::sync::Arc;
use std::time::Duration;

fn words() -> Arc<dyn TokenCounter> {
    Arc::new(|text: &str| text.split_whitespace().count())
}

fn coordinator_with<S>(store: S, provider: MockProvider, config: BufferConfig) -> FlushCoordinator<S>
where
    S: ProfileStore + Send + 'static,
    S::Error: std::fmt::Display,
{
    let gateway = LlmGateway::new(
        LlmBackend::Direct(Provider::Mock(provider)),
        "test-model",
        "test",
        words(),
        Arc::new(NoopTelemetry),
    );
    let extractor = Extractor::new(Arc::new(gateway), ExtractorConfig::default());
    FlushCoordinator::new(store, extractor, words(), config)
}

fn sqlite_coordinator(provider: MockProvider) -> FlushCoordinator<SqliteStore> {
    coordinator_with(SqliteStore::new(":memory:").unwrap(), provider, BufferConfig::default())
}

fn gus() -> RawRecord {
    RawRecord::chat(vec![ChatMessage::user("hello, I'm Gus"), ChatMessage::assistant("hi")]).unwrap()
}

fn doc(words: usize) -> RawRecord {
    RawRecord::document(vec!["word"; words].join(" ")).unwrap()
}

#[tokio::test]
async fn test_capacity_is_sum_of_sizes() {
    let coordinator = sqlite_coordinator(MockProvider::default());

    for size in [2, 7, 1] {
        coordinator.insert("u1", doc(size)).await.unwrap();
    }

    assert_eq!(coordinator.capacity("u1", BlobCategory::Document), 10);
    assert_eq!(coordinator.pending("u1", BlobCategory::Document), 3);
    assert_eq!(coordinator.capacity("u1", BlobCategory::Chat), 0);
}

#[tokio::test]
async fn test_end_to_end_manual_flush() {
    let provider = MockProvider::new("- basic_info::name::Gus::[0]");
    let coordinator = sqlite_coordinator(provider.clone());

    let receipt = coordinator.insert("u1", gus()).await.unwrap();
    assert_eq!(receipt.auto_flush, AutoFlush::NotTriggered);
    assert!(coordinator.capacity("u1", BlobCategory::Chat) > 0);
    assert_eq!(coordinator.pending("u1", BlobCategory::Chat), 1);
    assert_eq!(provider.call_count(), 0);

    let report = coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
    assert_eq!(provider.call_count(), 1);
    assert_eq!(report.records, 1);
    assert_eq!(report.created, 1);
    assert!(report.llm_called);

    let profiles = coordinator.profiles("u1").await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].topic, "basic_info");
    assert_eq!(profiles[0].sub_topic.as_deref(), Some("name"));
    assert_eq!(profiles[0].content, "Gus");

    assert_eq!(coordinator.capacity("u1", BlobCategory::Chat), 0);
    assert_eq!(coordinator.pending("u1", BlobCategory::Chat), 0);
}

#[tokio::test]
async fn test_empty_flush_skips_gateway() {
    let provider = MockProvider::new("- basic_info::name::Gus");
    let coordinator = sqlite_coordinator(provider.clone());

    let report = coordinator.flush("nobody", BlobCategory::Chat).await.unwrap();
    assert_eq!(report.records, 0);
    assert_eq!(report.deltas, 0);
    assert!(!report.llm_called);
    assert_eq!(provider.call_count(), 0);

    // Idempotent
    assert!(coordinator.flush("nobody", BlobCategory::Chat).await.is_ok());
}

#[tokio::test]
async fn test_auto_flush_over_threshold() {
    let provider = MockProvider::new("- interest::reading::likes long documents");
    let config = BufferConfig {
        max_document_blob_buffer_token_size: 10,
        ..Default::default()
    };
    let coordinator = coordinator_with(SqliteStore::new(":memory:").unwrap(), provider.clone(), config);

    // Exactly at threshold: no flush
    let receipt = coordinator.insert("u1", doc(10)).await.unwrap();
    assert_eq!(receipt.auto_flush, AutoFlush::NotTriggered);
    assert_eq!(receipt.capacity, 10);

    // Above threshold: flush runs inline
    let receipt = coordinator.insert("u1", doc(1)).await.unwrap();
    match receipt.auto_flush {
        AutoFlush::Completed(report) => {
            assert_eq!(report.records, 2);
            assert_eq!(report.created, 1);
        }
        other => panic!("expected completed flush, got {:?}", other),
    }
    assert_eq!(receipt.capacity, 0);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_concurrent_manual_flush_is_rejected() {
    let provider = MockProvider::new("- basic_info::name::Gus").with_delay(Duration::from_millis(300));
    let coordinator = Arc::new(sqlite_coordinator(provider.clone()));
    coordinator.insert("u1", gus()).await.unwrap();

    let background = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.flush("u1", BlobCategory::Chat).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // New records arrive while the first flush is in flight
    coordinator.insert("u1", gus()).await.unwrap();
    let second = coordinator.flush("u1", BlobCategory::Chat).await;
    assert_eq!(
        second,
        Err(FlushError::AlreadyFlushing {
            user_id: "u1".to_string(),
            category: BlobCategory::Chat,
        })
    );
    // Refused flush drained nothing
    assert_eq!(coordinator.pending("u1", BlobCategory::Chat), 1);

    let first = background.await.unwrap().unwrap();
    assert_eq!(first.created, 1);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(coordinator.profiles("u1").await.unwrap().len(), 1);
    assert_eq!(coordinator.metrics().contended, 1);

    // Lock released: the next flush goes through and updates nothing new
    let third = coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
    assert_eq!(third.records, 1);
    assert_eq!(third.created, 0);
    assert_eq!(coordinator.profiles("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_auto_flush_reports_already_running() {
    let provider = MockProvider::new("- mood::busy").with_delay(Duration::from_millis(300));
    let config = BufferConfig {
        max_document_blob_buffer_token_size: 1,
        ..Default::default()
    };
    let coordinator = Arc::new(coordinator_with(SqliteStore::new(":memory:").unwrap(), provider, config));

    let background = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.insert("u1", doc(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let receipt = coordinator.insert("u1", doc(5)).await.unwrap();
    assert_eq!(receipt.auto_flush, AutoFlush::AlreadyRunning);
    assert_eq!(receipt.capacity, 5);

    let first = background.await.unwrap().unwrap();
    assert!(matches!(first.auto_flush, AutoFlush::Completed(_)));
}

#[tokio::test]
async fn test_different_users_flush_concurrently() {
    let provider = MockProvider::new("- basic_info::name::Gus").with_delay(Duration::from_millis(200));
    let coordinator = Arc::new(sqlite_coordinator(provider.clone()));
    coordinator.insert("alice", gus()).await.unwrap();
    coordinator.insert("bob", gus()).await.unwrap();

    let (a, b) = tokio::join!(
        coordinator.flush("alice", BlobCategory::Chat),
        coordinator.flush("bob", BlobCategory::Chat)
    );
    assert_eq!(a.unwrap().created, 1);
    assert_eq!(b.unwrap().created, 1);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_same_user_categories_flush_concurrently_into_one_profile() {
    let provider = MockProvider::new("- basic_info::name::Gus\n- interest::reading::novels")
        .with_delay(Duration::from_millis(200));
    let coordinator = Arc::new(sqlite_coordinator(provider.clone()));
    coordinator.insert("u1", gus()).await.unwrap();
    coordinator.insert("u1", doc(4)).await.unwrap();

    let (chat, document) = tokio::join!(
        coordinator.flush("u1", BlobCategory::Chat),
        coordinator.flush("u1", BlobCategory::Document)
    );
    let chat = chat.unwrap();
    let document = document.unwrap();

    // Both extractions ran; the second merge saw the first one's entries
    assert_eq!(provider.call_count(), 2);
    assert_eq!(chat.created + document.created, 2);
    assert_eq!(chat.updated + document.updated, 0);
    assert_eq!(coordinator.metrics().failures, 0);

    let profiles = coordinator.profiles("u1").await.unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(coordinator.lock_count(), 0);
}

#[tokio::test]
async fn test_locks_are_dropped_after_use() {
    let provider = MockProvider::new("- basic_info::name::Gus");
    let coordinator = sqlite_coordinator(provider);

    for user in ["alice", "bob", "carol"] {
        coordinator.insert(user, gus()).await.unwrap();
        coordinator.flush(user, BlobCategory::Chat).await.unwrap();
    }
    coordinator.flush_user("dave").await;
    assert_eq!(coordinator.lock_count(), 0);

    let id = coordinator.profiles("alice").await.unwrap()[0].id;
    assert!(coordinator.forget_profile("alice", id).await.unwrap());
    assert_eq!(coordinator.lock_count(), 0);
}

#[tokio::test]
async fn test_cancelled_flush_releases_lock() {
    let provider = MockProvider::new("- basic_info::name::Gus").with_delay(Duration::from_millis(500));
    let coordinator = sqlite_coordinator(provider.clone());
    coordinator.insert("u1", gus()).await.unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(50), coordinator.flush("u1", BlobCategory::Chat)).await;
    assert!(cancelled.is_err());

    // Drained records were consumed; the lock is free again
    assert_eq!(coordinator.pending("u1", BlobCategory::Chat), 0);
    let report = coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
    assert_eq!(report.records, 0);
}

#[tokio::test]
async fn test_gateway_failure_consumes_records() {
    let provider = MockProvider::new("- basic_info::name::Gus");
    provider.queue_error("connection refused");
    let coordinator = sqlite_coordinator(provider.clone());
    coordinator.insert("u1", gus()).await.unwrap();

    let result = coordinator.flush("u1", BlobCategory::Chat).await;
    assert!(matches!(result, Err(FlushError::GatewayUnavailable(_))));
    assert_eq!(coordinator.pending("u1", BlobCategory::Chat), 0);
    assert!(coordinator.profiles("u1").await.unwrap().is_empty());
    assert_eq!(coordinator.metrics().failures, 1);

    // Next flush works
    coordinator.insert("u1", gus()).await.unwrap();
    assert_eq!(coordinator.flush("u1", BlobCategory::Chat).await.unwrap().created, 1);
}

#[tokio::test]
async fn test_unusable_output_is_successful_flush() {
    let provider = MockProvider::new("Sorry, nothing to report.\nAlso nothing here.");
    let coordinator = sqlite_coordinator(provider);
    coordinator.insert("u1", gus()).await.unwrap();

    let report = coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
    assert_eq!(report.deltas, 0);
    assert_eq!(report.parse_error, Some(ParseError::NoFacts { skipped: 2 }));
    assert_eq!(report.changes(), 0);
    assert_eq!(coordinator.capacity("u1", BlobCategory::Chat), 0);
}

#[tokio::test]
async fn test_malformed_lines_do_not_abort() {
    let provider = MockProvider::new(
        "- basic_info::name::Gus\nnot a fact\n- ::missing topic\n- interest::sports::basketball",
    );
    let coordinator = sqlite_coordinator(provider);
    coordinator.insert("u1", gus()).await.unwrap();

    let report = coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
    assert_eq!(report.deltas, 2);
    assert_eq!(report.skipped_lines, 2);
    assert_eq!(coordinator.profiles("u1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_second_flush_updates_in_place() {
    let provider = MockProvider::new("");
    provider.queue_response("- basic_info::age::30");
    provider.queue_response("- basic_info::age::31");
    let coordinator = sqlite_coordinator(provider);

    coordinator.insert("u1", gus()).await.unwrap();
    coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
    let before = coordinator.profiles("u1").await.unwrap();

    coordinator.insert("u1", gus()).await.unwrap();
    let report = coordinator.flush("u1", BlobCategory::Chat).await.unwrap();
    assert_eq!(report.updated, 1);

    let after = coordinator.profiles("u1").await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, before[0].id);
    assert_eq!(after[0].content, "31");
}

#[tokio::test]
async fn test_flush_user_covers_all_categories() {
    let provider = MockProvider::new("- work::title::writer");
    let coordinator = sqlite_coordinator(provider.clone());
    coordinator.insert("u1", gus()).await.unwrap();
    coordinator.insert("u1", doc(3)).await.unwrap();

    let results = coordinator.flush_user("u1").await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(provider.call_count(), 2);
    assert!(coordinator.pending_keys().is_empty());
}

#[tokio::test]
async fn test_invalid_record_rejected_before_buffering() {
    let coordinator = sqlite_coordinator(MockProvider::default());
    let blank = RawRecord {
        payload: RecordPayload::Chat { messages: vec![] },
        ..gus()
    };

    let result = coordinator.insert("u1", blank).await;
    assert!(matches!(result, Err(FlushError::InvalidRecord(_))));
    assert_eq!(coordinator.pending("u1", BlobCategory::Chat), 0);
}

#[tokio::test]
async fn test_forget_profile() {
    let coordinator = sqlite_coordinator(MockProvider::new("- basic_info::name::Gus"));
    coordinator.insert("u1", gus()).await.unwrap();
    coordinator.flush("u1", BlobCategory::Chat).await.unwrap();

    let id = coordinator.profiles("u1").await.unwrap()[0].id;
    assert!(coordinator.forget_profile("u1", id).await.unwrap());
    assert!(!coordinator.forget_profile("u1", id).await.unwrap());
    assert!(coordinator.profiles("u1").await.unwrap().is_empty());
}

/// Store whose writes always fail
struct BrokenStore;

impl ProfileStore for BrokenStore {
    type Error = String;

    fn load_profiles(&self, _user_id: &str) -> Result<Vec<ProfileEntry>, Self::Error> {
        Ok(Vec::new())
    }

    fn apply_profile_ops(&mut self, _user_id: &str, _ops: &[ProfileOp]) -> Result<(), Self::Error> {
        Err("disk full".to_string())
    }

    fn archive_records(&mut self, _user_id: &str, _records: &[RawRecord]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn delete_profile(&mut self, _user_id: &str, _id: ProfileId) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_store_failure_surfaces() {
    let coordinator = coordinator_with(BrokenStore, MockProvider::new("- a::b::c"), BufferConfig::default());
    coordinator.insert("u1", gus()).await.unwrap();

    let result = coordinator.flush("u1", BlobCategory::Chat).await;
    assert_eq!(result, Err(FlushError::Store("disk full".to_string())));
    assert_eq!(coordinator.pending("u1", BlobCategory::Chat), 0);
}

#[tokio::test]
async fn test_drained_records_are_archived() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoir.db");

    let provider = MockProvider::new("");
    provider.queue_error("upstream down");
    let coordinator = coordinator_with(SqliteStore::new(&path).unwrap(), provider, BufferConfig::default());
    let record = gus();
    coordinator.insert("u1", record.clone()).await.unwrap();
    assert!(coordinator.flush("u1", BlobCategory::Chat).await.is_err());

    // Consumed by the failed flush, but still on disk
    let store = SqliteStore::new(&path).unwrap();
    assert_eq!(store.archived_records("u1", Some(BlobCategory::Chat)).unwrap(), vec![record]);
}

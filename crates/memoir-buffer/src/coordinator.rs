//! Flush coordination
//!
//! Each (user, category) buffer moves IDLE → FLUSHING → IDLE. A flush holds
//! that key's async lock for its whole cycle:
//!
//! ```text
//! drain → archive → load profiles → extract → merge → persist
//! ```
//!
//! The lock is taken with `try_lock`, never awaited: a manual flush that
//! finds it held gets [`FlushError::AlreadyFlushing`], an automatic one just
//! skips. The owned guard is released on every exit path, including
//! cancellation of the flush future.
//!
//! Profiles belong to the user, not to the buffer, so flushes of different
//! categories for one user serialize their load → merge → persist step on a
//! per-user lock. Extraction itself still runs concurrently. Lock entries
//! are dropped from their maps once nobody holds them.

use crate::buffer::{BufferKey, TokenBuffer};
use crate::config::BufferConfig;
use crate::error::FlushError;
use crate::metrics::FlushMetrics;
use dashmap::DashMap;
use memoir_domain::traits::{ProfileStore, TokenCounter};
use memoir_domain::{BlobCategory, ProfileDelta, ProfileEntry, ProfileId, ProfileOp, RawRecord, RecordId};
use memoir_extractor::{merge, ExtractionRequest, Extractor, ParseError};
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What one flush cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    /// Buffer owner
    pub user_id: String,

    /// Buffer category
    pub category: BlobCategory,

    /// Records drained (and consumed)
    pub records: usize,

    /// Facts parsed from the model output
    pub deltas: usize,

    /// Output lines the parser rejected
    pub skipped_lines: usize,

    /// Set when the output held no usable facts
    pub parse_error: Option<ParseError>,

    /// Profile entries created
    pub created: usize,

    /// Profile entries updated
    pub updated: usize,

    /// Profile entries deleted
    pub deleted: usize,

    /// Whether the gateway was called
    pub llm_called: bool,
}

impl FlushReport {
    fn empty(user_id: &str, category: BlobCategory) -> Self {
        Self {
            user_id: user_id.to_string(),
            category,
            records: 0,
            deltas: 0,
            skipped_lines: 0,
            parse_error: None,
            created: 0,
            updated: 0,
            deleted: 0,
            llm_called: false,
        }
    }

    /// Total profile changes persisted
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Outcome of the automatic trigger on insert
#[derive(Debug, Clone, PartialEq)]
pub enum AutoFlush {
    /// The buffer stayed at or under its threshold
    NotTriggered,
    /// Over threshold, but a flush of this buffer was already running
    AlreadyRunning,
    /// The insert triggered a flush and it succeeded
    Completed(FlushReport),
    /// The insert triggered a flush and it failed; the record itself was accepted
    Failed(FlushError),
}

/// Result of a successful insert
#[derive(Debug, Clone, PartialEq)]
pub struct InsertReceipt {
    /// Id of the buffered record
    pub record_id: RecordId,

    /// Buffer size in tokens after the insert (and any flush it triggered)
    pub capacity: usize,

    /// What the automatic trigger did
    pub auto_flush: AutoFlush,
}

/// Owns the buffers and runs flush cycles against a store and an extractor
pub struct FlushCoordinator<S> {
    buffer: TokenBuffer,
    locks: DashMap<BufferKey, Arc<tokio::sync::Mutex<()>>>,
    profile_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    store: Arc<Mutex<S>>,
    extractor: Extractor,
    config: BufferConfig,
    metrics: Mutex<FlushMetrics>,
}

impl<S> FlushCoordinator<S>
where
    S: ProfileStore + Send + 'static,
    S::Error: Display,
{
    /// Create a coordinator with empty buffers
    pub fn new(store: S, extractor: Extractor, counter: Arc<dyn TokenCounter>, config: BufferConfig) -> Self {
        Self {
            buffer: TokenBuffer::new(counter),
            locks: DashMap::new(),
            profile_locks: DashMap::new(),
            store: Arc::new(Mutex::new(store)),
            extractor,
            config,
            metrics: Mutex::new(FlushMetrics::new()),
        }
    }

    /// The active thresholds
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Buffer a record and flush its buffer if it went over threshold.
    ///
    /// # Errors
    ///
    /// Only `InvalidRecord`; flush failures are reported in the receipt.
    pub async fn insert(&self, user_id: &str, record: RawRecord) -> Result<InsertReceipt, FlushError> {
        let record_id = record.id;
        let category = record.category();
        let capacity = self.buffer.append(user_id, record)?;
        let threshold = self.config.threshold_for(category);

        debug!(
            "Buffered record {} for ({}, {}): {} / {} tokens",
            record_id, user_id, category, capacity, threshold
        );

        if capacity <= threshold {
            return Ok(InsertReceipt {
                record_id,
                capacity,
                auto_flush: AutoFlush::NotTriggered,
            });
        }

        info!(
            "Buffer ({}, {}) over threshold ({} > {}), flushing",
            user_id, category, capacity, threshold
        );
        let auto_flush = match self.try_flush(user_id, category).await {
            Ok(report) => AutoFlush::Completed(report),
            Err(FlushError::AlreadyFlushing { .. }) => AutoFlush::AlreadyRunning,
            Err(e) => AutoFlush::Failed(e),
        };

        Ok(InsertReceipt {
            record_id,
            capacity: self.buffer.capacity(user_id, category),
            auto_flush,
        })
    }

    /// Flush one buffer now.
    ///
    /// Flushing an empty buffer succeeds without calling the gateway.
    ///
    /// # Errors
    ///
    /// `AlreadyFlushing` if a flush of the same buffer is running (nothing
    /// was drained; retry later). Any other error means the drained records
    /// were consumed without producing profile changes.
    pub async fn flush(&self, user_id: &str, category: BlobCategory) -> Result<FlushReport, FlushError> {
        self.try_flush(user_id, category).await
    }

    /// Flush every buffer category of one user
    pub async fn flush_user(&self, user_id: &str) -> Vec<(BlobCategory, Result<FlushReport, FlushError>)> {
        let mut results = Vec::with_capacity(BlobCategory::IMPLEMENTED.len());
        for category in BlobCategory::IMPLEMENTED {
            results.push((category, self.try_flush(user_id, category).await));
        }
        results
    }

    /// Buffered size in tokens
    pub fn capacity(&self, user_id: &str, category: BlobCategory) -> usize {
        self.buffer.capacity(user_id, category)
    }

    /// Number of buffered records
    pub fn pending(&self, user_id: &str, category: BlobCategory) -> usize {
        self.buffer.pending(user_id, category)
    }

    /// Buffers that currently hold records
    pub fn pending_keys(&self) -> Vec<BufferKey> {
        self.buffer.keys()
    }

    /// A user's current profile set
    pub async fn profiles(&self, user_id: &str) -> Result<Vec<ProfileEntry>, FlushError> {
        let user = user_id.to_string();
        self.with_store(move |store| store.load_profiles(&user)).await
    }

    /// Remove one profile entry on the user's request
    pub async fn forget_profile(&self, user_id: &str, id: ProfileId) -> Result<bool, FlushError> {
        let guard = self.lock_profiles(user_id).await;
        let user = user_id.to_string();
        let result = self.with_store(move |store| store.delete_profile(&user, id)).await;
        drop(guard);
        self.release_profiles(user_id);
        result
    }

    /// Flush and profile locks currently tracked; zero when nothing is in flight
    pub fn lock_count(&self) -> usize {
        self.locks.len() + self.profile_locks.len()
    }

    /// Snapshot of the flush counters
    pub fn metrics(&self) -> FlushMetrics {
        self.lock_metrics().clone()
    }

    async fn try_flush(&self, user_id: &str, category: BlobCategory) -> Result<FlushReport, FlushError> {
        let key = (user_id.to_string(), category);
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let Ok(guard) = lock.try_lock_owned() else {
            debug!("Flush of ({}, {}) already in progress", user_id, category);
            self.lock_metrics().record_contention();
            return Err(FlushError::AlreadyFlushing {
                user_id: user_id.to_string(),
                category,
            });
        };

        let start = Instant::now();
        let result = self.run_cycle(user_id, category).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        drop(guard);
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        let mut metrics = self.lock_metrics();
        match &result {
            Ok(report) => {
                metrics.record_cycle(category, elapsed_ms);
                metrics.record_changes(report.records, report.created, report.updated, report.deleted);
            }
            Err(e) => {
                error!("Flush of ({}, {}) failed: {}", user_id, category, e);
                metrics.record_failure();
            }
        }

        result
    }

    async fn run_cycle(&self, user_id: &str, category: BlobCategory) -> Result<FlushReport, FlushError> {
        let records = self.buffer.snapshot_and_clear(user_id, category);
        if records.is_empty() {
            debug!("Buffer ({}, {}) is empty, nothing to flush", user_id, category);
            return Ok(FlushReport::empty(user_id, category));
        }

        info!("Flushing {} records from ({}, {})", records.len(), user_id, category);

        let user = user_id.to_string();
        let archived = records.clone();
        self.with_store(move |store| store.archive_records(&user, &archived))
            .await?;

        let user = user_id.to_string();
        let existing = self.with_store(move |store| store.load_profiles(&user)).await?;

        let mut report = FlushReport::empty(user_id, category);
        report.records = records.len();

        let outcome = self
            .extractor
            .extract(ExtractionRequest::new(user_id, records, existing))
            .await?;
        report.llm_called = outcome.metadata.llm_called;
        report.deltas = outcome.deltas.len();
        report.skipped_lines = outcome.skipped;
        if let Some(e) = &outcome.parse_error {
            warn!("No usable facts for ({}, {}): {}", user_id, category, e);
        }
        report.parse_error = outcome.parse_error;

        let guard = self.lock_profiles(user_id).await;
        let merged = self.merge_and_persist(user_id, &outcome.deltas).await;
        drop(guard);
        self.release_profiles(user_id);

        let ops = merged?;
        for op in &ops {
            match op {
                ProfileOp::Create(_) => report.created += 1,
                ProfileOp::Update(_) => report.updated += 1,
                ProfileOp::Delete(_) => report.deleted += 1,
            }
        }

        info!(
            "Flushed ({}, {}): {} records, {} created, {} updated, {} deleted",
            user_id, category, report.records, report.created, report.updated, report.deleted
        );
        Ok(report)
    }

    /// Merge against the profiles as they are now and persist the result.
    /// Callers hold the user's profile lock.
    async fn merge_and_persist(&self, user_id: &str, deltas: &[ProfileDelta]) -> Result<Vec<ProfileOp>, FlushError> {
        let user = user_id.to_string();
        let current = self.with_store(move |store| store.load_profiles(&user)).await?;
        let ops = merge::apply(user_id, &current, deltas);

        if !ops.is_empty() {
            let user = user_id.to_string();
            let batch = ops.clone();
            self.with_store(move |store| store.apply_profile_ops(&user, &batch))
                .await?;
        }
        Ok(ops)
    }

    async fn lock_profiles(&self, user_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = Arc::clone(self.profile_locks.entry(user_id.to_string()).or_default().value());
        lock.lock_owned().await
    }

    fn release_profiles(&self, user_id: &str) {
        self.profile_locks.remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Run a store call on the blocking pool
    async fn with_store<T, F>(&self, op: F) -> Result<T, FlushError>
    where
        F: FnOnce(&mut S) -> Result<T, S::Error> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store
                .lock()
                .map_err(|_| FlushError::Internal("store mutex poisoned".to_string()))?;
            op(&mut guard).map_err(|e| FlushError::Store(e.to_string()))
        })
        .await
        .map_err(|e| FlushError::Internal(format!("store task failed: {}", e)))?
    }

    fn lock_metrics(&self) -> MutexGuard<'_, FlushMetrics> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

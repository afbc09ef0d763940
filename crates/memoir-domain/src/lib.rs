//! Memoir Domain Layer
//!
//! Core vocabulary shared by every Memoir crate: the raw records users feed in,
//! the profile facts distilled from them, and the trait boundaries to the
//! collaborators the pipeline depends on (persistence, token counting,
//! telemetry).
//!
//! ## Key Concepts
//!
//! - **RawRecord**: one ingested unit (a chat turn group or a document)
//! - **ProfileEntry**: one persisted fact about a user, keyed by topic/sub-topic
//! - **ProfileDelta**: one parsed, not-yet-applied change to a profile set
//! - **ProfileOp**: a create/update/delete instruction handed to the store
//! - **Provenance**: indices linking a delta back to the records it came from
//!
//! ## Architecture
//!
//! - No I/O, no async runtime
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod profile;
pub mod record;
pub mod traits;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-exports for convenience
pub use profile::{DeltaAction, ProfileDelta, ProfileEntry, ProfileId, ProfileOp};
pub use record::{BlobCategory, ChatMessage, RawRecord, RecordError, RecordId, RecordPayload};

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

//! Request and result types for extraction

use crate::parser::ParseError;
use memoir_domain::{ProfileDelta, ProfileEntry, RawRecord};

/// Everything one extraction call needs
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Owner of the records and profiles
    pub user_id: String,

    /// Drained buffer contents, in arrival order; provenance indexes this
    pub records: Vec<RawRecord>,

    /// The user's current profile set
    pub existing_profiles: Vec<ProfileEntry>,
}

impl ExtractionRequest {
    /// Create a request
    pub fn new(user_id: impl Into<String>, records: Vec<RawRecord>, existing_profiles: Vec<ProfileEntry>) -> Self {
        Self {
            user_id: user_id.into(),
            records,
            existing_profiles,
        }
    }
}

/// What came back from one extraction call
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Parsed facts, in output order
    pub deltas: Vec<ProfileDelta>,

    /// Output lines or JSON entries that were rejected
    pub skipped: usize,

    /// Set when the output contained nothing usable; `deltas` is then empty
    pub parse_error: Option<ParseError>,

    /// Metadata about the call
    pub metadata: ExtractionMetadata,
}

/// Metadata about an extraction call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionMetadata {
    /// Model that produced the output
    pub model_name: String,

    /// Records sent to the model
    pub records: usize,

    /// Whether the gateway was called at all
    pub llm_called: bool,

    /// Wall-clock duration
    pub processing_time_ms: u64,
}

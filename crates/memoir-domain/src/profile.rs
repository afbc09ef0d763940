//! Profile facts - what Memoir remembers about a user

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a profile entry based on UUIDv7
///
/// UUIDv7 keeps identifiers sortable by creation time, so listing a user's
/// profile by id also lists it chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileId(u128);

impl ProfileId {
    /// Generate a new UUIDv7-based ProfileId
    ///
    /// # Examples
    ///
    /// ```
    /// use memoir_domain::ProfileId;
    ///
    /// let id = ProfileId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a ProfileId from a raw u128 value
    ///
    /// This is primarily for storage layer deserialization.
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a ProfileId from its UUID string form
    ///
    /// # Examples
    ///
    /// ```
    /// use memoir_domain::ProfileId;
    ///
    /// let id = ProfileId::new();
    /// let parsed = ProfileId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid profile id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// A persisted fact about a user.
///
/// Within one user there is at most one entry per `(topic, sub_topic)` key;
/// later facts about the same key overwrite `content` in place and keep `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    /// Stable identifier, assigned on creation
    pub id: ProfileId,

    /// Owning user
    pub user_id: String,

    /// Broad category, e.g. "basic_info"
    pub topic: String,

    /// Finer key within the topic, e.g. "name"
    pub sub_topic: Option<String>,

    /// The remembered value
    pub content: String,

    /// Creation time (unix seconds)
    pub created_at: u64,

    /// Last content change (unix seconds)
    pub updated_at: u64,
}

impl ProfileEntry {
    /// Create a fresh entry with a new id
    pub fn new(
        user_id: impl Into<String>,
        topic: impl Into<String>,
        sub_topic: Option<String>,
        content: impl Into<String>,
        now: u64,
    ) -> Self {
        Self {
            id: ProfileId::new(),
            user_id: user_id.into(),
            topic: topic.into(),
            sub_topic,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Uniqueness key within a user's profile set
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.topic.as_str(), self.sub_topic.as_deref())
    }
}

/// What a parsed fact asks the merge engine to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaAction {
    /// Add a fact (becomes an update if the key is occupied)
    #[default]
    Add,
    /// Replace an existing fact (becomes a create if the key is free)
    Update,
    /// Remove a fact if present
    Delete,
}

impl DeltaAction {
    /// Convert to a stable string
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaAction::Add => "add",
            DeltaAction::Update => "update",
            DeltaAction::Delete => "delete",
        }
    }
}

/// One parsed, not-yet-applied change to a profile set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDelta {
    /// Topic key
    pub topic: String,

    /// Optional sub-topic key
    pub sub_topic: Option<String>,

    /// Fact content (empty for deletes)
    pub content: String,

    /// Indices into the record batch this fact was derived from
    pub provenance: Vec<usize>,

    /// Requested action
    pub action: DeltaAction,
}

impl ProfileDelta {
    /// An ADD delta without provenance
    pub fn add(topic: impl Into<String>, sub_topic: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            sub_topic: sub_topic.map(str::to_string),
            content: content.into(),
            provenance: Vec::new(),
            action: DeltaAction::Add,
        }
    }

    /// Set the action
    pub fn with_action(mut self, action: DeltaAction) -> Self {
        self.action = action;
        self
    }

    /// Set provenance indices
    pub fn with_provenance(mut self, provenance: Vec<usize>) -> Self {
        self.provenance = provenance;
        self
    }

    /// Uniqueness key this delta targets
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.topic.as_str(), self.sub_topic.as_deref())
    }
}

/// A persistence instruction produced by merging deltas
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileOp {
    /// Insert a new entry
    Create(ProfileEntry),
    /// Overwrite an existing entry (same id)
    Update(ProfileEntry),
    /// Remove an entry
    Delete(ProfileId),
}

impl ProfileOp {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProfileOp::Create(_) => "create",
            ProfileOp::Update(_) => "update",
            ProfileOp::Delete(_) => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_id_ordering() {
        let id1 = ProfileId::from_value(1000);
        let id2 = ProfileId::from_value(2000);
        assert!(id1 < id2);
    }

    #[test]
    fn test_profile_id_chronological() {
        let id1 = ProfileId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = ProfileId::new();
        assert!(id1 < id2, "Earlier UUIDv7 should sort first");
    }

    #[test]
    fn test_profile_id_invalid_string() {
        assert!(ProfileId::from_string("not-a-valid-uuid").is_err());
        assert!(ProfileId::from_string("").is_err());
    }

    #[test]
    fn test_entry_key() {
        let entry = ProfileEntry::new("u1", "basic_info", Some("name".to_string()), "Gus", 10);
        assert_eq!(entry.key(), ("basic_info", Some("name")));
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[test]
    fn test_delta_builders() {
        let delta = ProfileDelta::add("interest", None, "basketball")
            .with_action(DeltaAction::Update)
            .with_provenance(vec![0, 2]);
        assert_eq!(delta.key(), ("interest", None));
        assert_eq!(delta.action, DeltaAction::Update);
        assert_eq!(delta.provenance, vec![0, 2]);
    }
}

//! Raw records - the units of user input that feed the extraction pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for a raw record (UUIDv7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u128);

impl RecordId {
    /// Generate a new time-ordered identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Wrap a raw value (storage layer deserialization)
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse from the hyphenated UUID form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid record id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// Category of an ingested blob.
///
/// Buffers are keyed by (user, category). `Image` and `Transcript` are part of
/// the wire vocabulary but have no payload decoder yet; records of those
/// categories are rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobCategory {
    /// Groups of chat turns
    Chat,
    /// Free-form documents
    #[serde(alias = "doc")]
    Document,
    /// Images (not implemented)
    Image,
    /// Audio transcripts (not implemented)
    Transcript,
}

impl BlobCategory {
    /// Categories the pipeline can buffer and extract from
    pub const IMPLEMENTED: [BlobCategory; 2] = [BlobCategory::Chat, BlobCategory::Document];

    /// Convert to a stable string
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobCategory::Chat => "chat",
            BlobCategory::Document => "document",
            BlobCategory::Image => "image",
            BlobCategory::Transcript => "transcript",
        }
    }

    /// Whether records of this category can be constructed
    pub fn is_implemented(&self) -> bool {
        matches!(self, BlobCategory::Chat | BlobCategory::Document)
    }
}

impl fmt::Display for BlobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlobCategory {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Ok(BlobCategory::Chat),
            "doc" | "document" => Ok(BlobCategory::Document),
            "image" => Ok(BlobCategory::Image),
            "transcript" => Ok(BlobCategory::Transcript),
            other => Err(RecordError::Malformed(format!("unknown blob category '{}'", other))),
        }
    }
}

/// Errors raised while constructing or validating a record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Category is declared but has no implementation
    #[error("{0} records are not supported yet")]
    Unsupported(BlobCategory),

    /// Payload does not match its category's shape
    #[error("Malformed record payload: {0}")]
    Malformed(String),
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role ("user", "assistant", "system")
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Shorthand for a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Shorthand for an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Category-specific record content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordPayload {
    /// Ordered chat turns
    Chat {
        /// Messages in conversation order
        messages: Vec<ChatMessage>,
    },
    /// A document body
    Document {
        /// Document text
        content: String,
    },
}

impl RecordPayload {
    /// The category this payload belongs to
    pub fn category(&self) -> BlobCategory {
        match self {
            RecordPayload::Chat { .. } => BlobCategory::Chat,
            RecordPayload::Document { .. } => BlobCategory::Document,
        }
    }
}

#[derive(Deserialize)]
struct ChatBlob {
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct DocumentBlob {
    content: String,
}

/// One ingested unit of user input.
///
/// Records are immutable once constructed: the buffer owns them until a flush
/// drains them, after which they are archived by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Unique identifier
    pub id: RecordId,

    /// Category-specific content
    pub payload: RecordPayload,

    /// Free-form caller metadata
    pub fields: Map<String, Value>,

    /// Creation time (unix seconds)
    pub created_at: u64,
}

impl RawRecord {
    /// Build a validated record from a payload
    pub fn new(payload: RecordPayload, fields: Map<String, Value>) -> Result<Self, RecordError> {
        let record = Self {
            id: RecordId::new(),
            payload,
            fields,
            created_at: crate::unix_now(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Chat record without metadata
    pub fn chat(messages: Vec<ChatMessage>) -> Result<Self, RecordError> {
        Self::new(RecordPayload::Chat { messages }, Map::new())
    }

    /// Document record without metadata
    pub fn document(content: impl Into<String>) -> Result<Self, RecordError> {
        Self::new(
            RecordPayload::Document {
                content: content.into(),
            },
            Map::new(),
        )
    }

    /// Decode a loosely-typed blob (`blob_type` + `blob_data` + `fields`).
    ///
    /// # Examples
    ///
    /// ```
    /// use memoir_domain::{BlobCategory, RawRecord};
    /// use serde_json::json;
    ///
    /// let record = RawRecord::from_blob(
    ///     BlobCategory::Chat,
    ///     json!({"messages": [{"role": "user", "content": "hello, I'm Gus"}]}),
    ///     None,
    /// ).unwrap();
    /// assert_eq!(record.category(), BlobCategory::Chat);
    ///
    /// assert!(RawRecord::from_blob(BlobCategory::Image, json!({}), None).is_err());
    /// ```
    pub fn from_blob(
        category: BlobCategory,
        data: Value,
        fields: Option<Map<String, Value>>,
    ) -> Result<Self, RecordError> {
        let payload = match category {
            BlobCategory::Chat => {
                let blob: ChatBlob = serde_json::from_value(data)
                    .map_err(|e| RecordError::Malformed(format!("chat blob: {}", e)))?;
                RecordPayload::Chat {
                    messages: blob.messages,
                }
            }
            BlobCategory::Document => {
                let blob: DocumentBlob = serde_json::from_value(data)
                    .map_err(|e| RecordError::Malformed(format!("document blob: {}", e)))?;
                RecordPayload::Document {
                    content: blob.content,
                }
            }
            BlobCategory::Image | BlobCategory::Transcript => {
                return Err(RecordError::Unsupported(category));
            }
        };
        Self::new(payload, fields.unwrap_or_default())
    }

    /// The record's category
    pub fn category(&self) -> BlobCategory {
        self.payload.category()
    }

    /// Check the payload is usable for extraction
    pub fn validate(&self) -> Result<(), RecordError> {
        match &self.payload {
            RecordPayload::Chat { messages } => {
                if messages.is_empty() {
                    return Err(RecordError::Malformed("chat record has no messages".to_string()));
                }
                if messages.iter().all(|m| m.content.trim().is_empty()) {
                    return Err(RecordError::Malformed("chat record has only empty messages".to_string()));
                }
                if let Some(m) = messages.iter().find(|m| m.role.trim().is_empty()) {
                    return Err(RecordError::Malformed(format!("message without role: {:?}", m.content)));
                }
            }
            RecordPayload::Document { content } => {
                if content.trim().is_empty() {
                    return Err(RecordError::Malformed("document record is empty".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Text form used for token accounting and prompt building
    pub fn render(&self) -> String {
        match &self.payload {
            RecordPayload::Chat { messages } => messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
            RecordPayload::Document { content } => content.clone(),
        }
    }
}

//! Memoir Storage Layer
//!
//! Implements the `ProfileStore` trait on SQLite.
//!
//! # Architecture
//!
//! - `profiles`: one row per remembered fact, unique per (user, topic, sub_topic)
//! - `raw_records`: archive of every record that left a buffer
//!
//! Merge batches are applied inside a single transaction, so a flush either
//! lands completely or not at all.
//!
//! # Examples
//!
//! ```no_run
//! use memoir_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for profile operations
//! ```

#![warn(missing_docs)]

use memoir_domain::traits::ProfileStore;
use memoir_domain::{BlobCategory, ProfileEntry, ProfileId, ProfileOp, RawRecord, RecordId, RecordPayload};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// JSON encoding of payloads or fields failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// SQLite-based implementation of ProfileStore
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store behind a mutex; the
/// flush coordinator does exactly that.
pub struct SqliteStore {
    conn: Connection,
}

const PROFILE_COLUMNS: &str = "id, user_id, topic, sub_topic, content, created_at, updated_at";

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Fetch one profile entry
    pub fn get_profile(&self, user_id: &str, id: ProfileId) -> Result<Option<ProfileEntry>, StoreError> {
        let sql = format!("SELECT {} FROM profiles WHERE id = ?1 AND user_id = ?2", PROFILE_COLUMNS);
        let entry = self
            .conn
            .query_row(&sql, params![id_to_bytes(id.value()), user_id], row_to_entry)
            .optional()?;
        Ok(entry)
    }

    /// Records archived for a user, oldest first
    pub fn archived_records(
        &self,
        user_id: &str,
        category: Option<BlobCategory>,
    ) -> Result<Vec<RawRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, payload, fields, created_at FROM raw_records
             WHERE user_id = ?1 AND (?2 IS NULL OR category = ?2)
             ORDER BY created_at, id",
        )?;

        let rows = stmt
            .query_map(params![user_id, category.map(|c| c.as_str())], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, payload, fields, created_at)| {
                Ok(RawRecord {
                    id: RecordId::from_value(bytes_to_id(&id)?),
                    payload: serde_json::from_str::<RecordPayload>(&payload)?,
                    fields: serde_json::from_str(&fields)?,
                    created_at: created_at as u64,
                })
            })
            .collect()
    }
}

impl ProfileStore for SqliteStore {
    type Error = StoreError;

    fn load_profiles(&self, user_id: &str) -> Result<Vec<ProfileEntry>, Self::Error> {
        let sql = format!(
            "SELECT {} FROM profiles WHERE user_id = ?1 ORDER BY created_at, id",
            PROFILE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![user_id], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn apply_profile_ops(&mut self, user_id: &str, ops: &[ProfileOp]) -> Result<(), Self::Error> {
        if ops.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for op in ops {
            match op {
                ProfileOp::Create(entry) => {
                    if entry.user_id != user_id {
                        return Err(StoreError::InvalidData(format!(
                            "entry {} belongs to '{}', not '{}'",
                            entry.id, entry.user_id, user_id
                        )));
                    }
                    tx.execute(
                        "INSERT INTO profiles (id, user_id, topic, sub_topic, content, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            id_to_bytes(entry.id.value()),
                            user_id,
                            &entry.topic,
                            &entry.sub_topic,
                            &entry.content,
                            entry.created_at as i64,
                            entry.updated_at as i64,
                        ],
                    )?;
                }
                ProfileOp::Update(entry) => {
                    // Upsert by id: an entry deleted out from under the merge is recreated
                    tx.execute(
                        "INSERT INTO profiles (id, user_id, topic, sub_topic, content, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                         ON CONFLICT(id) DO UPDATE SET
                         content = excluded.content, updated_at = excluded.updated_at",
                        params![
                            id_to_bytes(entry.id.value()),
                            user_id,
                            &entry.topic,
                            &entry.sub_topic,
                            &entry.content,
                            entry.created_at as i64,
                            entry.updated_at as i64,
                        ],
                    )?;
                }
                ProfileOp::Delete(id) => {
                    tx.execute(
                        "DELETE FROM profiles WHERE id = ?1 AND user_id = ?2",
                        params![id_to_bytes(id.value()), user_id],
                    )?;
                }
            }
        }
        tx.commit()?;

        debug!("Applied {} profile ops for user '{}'", ops.len(), user_id);
        Ok(())
    }

    fn archive_records(&mut self, user_id: &str, records: &[RawRecord]) -> Result<(), Self::Error> {
        if records.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for record in records {
            tx.execute(
                "INSERT OR IGNORE INTO raw_records (id, user_id, category, payload, fields, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id_to_bytes(record.id.value()),
                    user_id,
                    record.category().as_str(),
                    serde_json::to_string(&record.payload)?,
                    serde_json::to_string(&record.fields)?,
                    record.created_at as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_profile(&mut self, user_id: &str, id: ProfileId) -> Result<bool, Self::Error> {
        let removed = self.conn.execute(
            "DELETE FROM profiles WHERE id = ?1 AND user_id = ?2",
            params![id_to_bytes(id.value()), user_id],
        )?;
        Ok(removed > 0)
    }
}

fn id_to_bytes(value: u128) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn bytes_to_id(bytes: &[u8]) -> Result<u128, StoreError> {
    let arr: [u8; 16] = bytes.try_into().map_err(|_| {
        StoreError::InvalidData(format!("Expected 16 bytes for id, got {}", bytes.len()))
    })?;
    Ok(u128::from_be_bytes(arr))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ProfileEntry> {
    let id_bytes: Vec<u8> = row.get(0)?;
    let id = bytes_to_id(&id_bytes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Blob, Box::new(e))
    })?;

    Ok(ProfileEntry {
        id: ProfileId::from_value(id),
        user_id: row.get(1)?,
        topic: row.get(2)?,
        sub_topic: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get::<_, i64>(5)? as u64,
        updated_at: row.get::<_, i64>(6)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_bytes_roundtrip() {
        let value = ProfileId::new().value();
        assert_eq!(bytes_to_id(&id_to_bytes(value)).unwrap(), value);
    }

    #[test]
    fn test_bytes_to_id_wrong_length() {
        assert!(matches!(bytes_to_id(&[1, 2, 3]), Err(StoreError::InvalidData(_))));
    }
}

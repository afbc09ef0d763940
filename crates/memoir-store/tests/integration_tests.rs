//! Integration tests for memoir-store
//!
//! These tests verify profile batches, user isolation, and the record archive.

use memoir_domain::traits::ProfileStore;
use memoir_domain::{BlobCategory, ChatMessage, ProfileEntry, ProfileId, ProfileOp, RawRecord};
use memoir_store::{SqliteStore, StoreError};
use serde_json::json;

fn entry(user: &str, topic: &str, sub_topic: Option<&str>, content: &str) -> ProfileEntry {
    ProfileEntry::new(user, topic, sub_topic.map(str::to_string), content, 1000)
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_create_and_load_profiles() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let first = entry("u1", "interest", Some("sports"), "user likes to play basketball");
    let second = entry("u1", "education", Some("level"), "user is a junior school student");

    store
        .apply_profile_ops("u1", &[ProfileOp::Create(first.clone()), ProfileOp::Create(second.clone())])
        .unwrap();

    let loaded = store.load_profiles("u1").unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], first);
    assert_eq!(loaded[1], second);
}

#[test]
fn test_update_preserves_id() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let original = entry("u1", "basic_info", Some("name"), "Gus");
    store.apply_profile_ops("u1", &[ProfileOp::Create(original.clone())]).unwrap();

    let mut updated = original.clone();
    updated.content = "Gustavo".to_string();
    updated.updated_at = 2000;
    store.apply_profile_ops("u1", &[ProfileOp::Update(updated)]).unwrap();

    let loaded = store.load_profiles("u1").unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, original.id);
    assert_eq!(loaded[0].content, "Gustavo");
    assert_eq!(loaded[0].created_at, 1000);
    assert_eq!(loaded[0].updated_at, 2000);
}

#[test]
fn test_delete_op() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let doomed = entry("u1", "basic_info", Some("age"), "30");
    store.apply_profile_ops("u1", &[ProfileOp::Create(doomed.clone())]).unwrap();
    store.apply_profile_ops("u1", &[ProfileOp::Delete(doomed.id)]).unwrap();

    assert!(store.load_profiles("u1").unwrap().is_empty());
}

#[test]
fn test_duplicate_key_rolls_back_whole_batch() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let ok = entry("u1", "interest", Some("music"), "jazz");
    let first = entry("u1", "basic_info", Some("name"), "Gus");
    let clash = entry("u1", "basic_info", Some("name"), "Gustavo");

    let result = store.apply_profile_ops(
        "u1",
        &[ProfileOp::Create(ok), ProfileOp::Create(first), ProfileOp::Create(clash)],
    );
    assert!(matches!(result, Err(StoreError::Database(_))));
    assert!(store.load_profiles("u1").unwrap().is_empty(), "Batch should be atomic");
}

#[test]
fn test_null_sub_topic_is_unique_too() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    store
        .apply_profile_ops("u1", &[ProfileOp::Create(entry("u1", "mood", None, "happy"))])
        .unwrap();
    let result = store.apply_profile_ops("u1", &[ProfileOp::Create(entry("u1", "mood", None, "sad"))]);
    assert!(result.is_err());
}

#[test]
fn test_users_are_isolated() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let alice = entry("alice", "basic_info", Some("name"), "Alice");
    let bob = entry("bob", "basic_info", Some("name"), "Bob");
    store.apply_profile_ops("alice", &[ProfileOp::Create(alice.clone())]).unwrap();
    store.apply_profile_ops("bob", &[ProfileOp::Create(bob)]).unwrap();

    assert_eq!(store.load_profiles("alice").unwrap().len(), 1);
    assert_eq!(store.load_profiles("bob").unwrap().len(), 1);

    // Bob cannot delete Alice's entry
    assert!(!store.delete_profile("bob", alice.id).unwrap());
    assert!(store.delete_profile("alice", alice.id).unwrap());
    assert!(store.load_profiles("alice").unwrap().is_empty());
}

#[test]
fn test_create_for_wrong_user_rejected() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let result = store.apply_profile_ops("bob", &[ProfileOp::Create(entry("alice", "t", None, "c"))]);
    assert!(matches!(result, Err(StoreError::InvalidData(_))));
}

#[test]
fn test_delete_missing_profile() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    assert!(!store.delete_profile("u1", ProfileId::new()).unwrap());
}

#[test]
fn test_get_profile() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let gus = entry("u1", "basic_info", Some("name"), "Gus");
    store.apply_profile_ops("u1", &[ProfileOp::Create(gus.clone())]).unwrap();

    assert_eq!(store.get_profile("u1", gus.id).unwrap(), Some(gus.clone()));
    assert_eq!(store.get_profile("u2", gus.id).unwrap(), None);
}

#[test]
fn test_archive_records() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let chat = RawRecord::chat(vec![
        ChatMessage::user("hello, I'm Gus"),
        ChatMessage::assistant("hi"),
    ])
    .unwrap();
    let mut fields = serde_json::Map::new();
    fields.insert("from".to_string(), json!("happy"));
    let doc = RawRecord::from_blob(BlobCategory::Document, json!({"content": "Hello world"}), Some(fields)).unwrap();

    store.archive_records("u1", &[chat.clone(), doc.clone()]).unwrap();
    // Archiving twice is harmless
    store.archive_records("u1", &[chat.clone()]).unwrap();

    let all = store.archived_records("u1", None).unwrap();
    assert_eq!(all.len(), 2);

    let chats = store.archived_records("u1", Some(BlobCategory::Chat)).unwrap();
    assert_eq!(chats, vec![chat]);

    let docs = store.archived_records("u1", Some(BlobCategory::Document)).unwrap();
    assert_eq!(docs, vec![doc]);

    assert!(store.archived_records("u2", None).unwrap().is_empty());
}

#[test]
fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoir.db");

    let gus = entry("u1", "basic_info", Some("name"), "Gus");
    {
        let mut store = SqliteStore::new(&path).unwrap();
        store.apply_profile_ops("u1", &[ProfileOp::Create(gus.clone())]).unwrap();
    }

    let store = SqliteStore::new(&path).unwrap();
    assert_eq!(store.load_profiles("u1").unwrap(), vec![gus]);
}

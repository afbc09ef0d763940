//! Profile merge engine
//!
//! Folds a batch of deltas into a user's existing profile set and emits the
//! minimal list of store operations. Keys are `(topic, sub_topic)`; one entry
//! per key.

use memoir_domain::{unix_now, DeltaAction, ProfileDelta, ProfileEntry, ProfileOp};
use std::collections::HashMap;
use tracing::debug;

type Key = (String, Option<String>);

struct Slot {
    original: Option<ProfileEntry>,
    current: Option<ProfileEntry>,
}

/// Merge `deltas` into `existing`, stamping changes with the current time
pub fn apply(user_id: &str, existing: &[ProfileEntry], deltas: &[ProfileDelta]) -> Vec<ProfileOp> {
    apply_at(user_id, existing, deltas, unix_now())
}

/// Merge with an explicit timestamp.
///
/// Deltas are folded in order, so a later delta on the same key wins. Ops
/// come out in the order their keys were first touched.
pub fn apply_at(
    user_id: &str,
    existing: &[ProfileEntry],
    deltas: &[ProfileDelta],
    now: u64,
) -> Vec<ProfileOp> {
    let mut by_key: HashMap<Key, &ProfileEntry> = HashMap::with_capacity(existing.len());
    for entry in existing {
        by_key.entry(owned_key(entry.key())).or_insert(entry);
    }

    let mut order: Vec<Key> = Vec::new();
    let mut slots: HashMap<Key, Slot> = HashMap::new();

    for delta in deltas {
        let key = owned_key(delta.key());
        let slot = slots.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            let original = by_key.get(&key).map(|e| (*e).clone());
            Slot {
                current: original.clone(),
                original,
            }
        });

        match delta.action {
            DeltaAction::Add | DeltaAction::Update => {
                let content = delta.content.trim();
                match slot.current.as_mut() {
                    Some(entry) => {
                        if entry.content != content {
                            entry.content = content.to_string();
                            entry.updated_at = now;
                        }
                    }
                    None => {
                        // Revive a key deleted earlier in this batch under its old id
                        let entry = match &slot.original {
                            Some(original) => ProfileEntry {
                                content: content.to_string(),
                                updated_at: now,
                                ..original.clone()
                            },
                            None => ProfileEntry::new(
                                user_id,
                                delta.topic.clone(),
                                delta.sub_topic.clone(),
                                content,
                                now,
                            ),
                        };
                        slot.current = Some(entry);
                    }
                }
            }
            DeltaAction::Delete => slot.current = None,
        }
    }

    let mut ops = Vec::new();
    for key in order {
        let Some(slot) = slots.remove(&key) else {
            continue;
        };
        match (slot.original, slot.current) {
            (None, None) => {}
            (None, Some(created)) => ops.push(ProfileOp::Create(created)),
            (Some(original), None) => ops.push(ProfileOp::Delete(original.id)),
            (Some(original), Some(current)) => {
                if original.content != current.content {
                    ops.push(ProfileOp::Update(current));
                }
            }
        }
    }

    debug!(
        "Merged {} deltas into {} existing entries: {} ops",
        deltas.len(),
        existing.len(),
        ops.len()
    );
    ops
}

fn owned_key((topic, sub_topic): (&str, Option<&str>)) -> Key {
    (topic.to_string(), sub_topic.map(str::to_string))
}

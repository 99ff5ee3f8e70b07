//! The payload extractor (component C2): pulls the fields the storage
//! layer needs out of a client-submitted JSON object while preserving the
//! object verbatim for storage.
//!
//! This is a read-through: the extractor parses a projection out of the
//! object without consuming or re-serializing it, so storage always gets
//! the original bytes back on the next pull.

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use ledgersync_core::EntityKind;
use ledgersync_storage::{ParentRef, PushItem};

use crate::error::SyncError;

/// Extracts a [`PushItem`] from one element of a push batch's `items`
/// array.
///
/// # Errors
///
/// Returns [`SyncError::Validation`] when `uid` is missing/unparseable,
/// when no usable timestamp is present, or when the kind requires a
/// parent reference the object doesn't carry.
pub fn extract(kind: EntityKind, raw: &Value) -> Result<PushItem, SyncError> {
    let uid = extract_uid(raw)?;
    let updated_at_ms = extract_updated_at_ms(raw)?;
    let deleted_at_ms = extract_deleted_at_ms(raw);
    let client_version = extract_client_version(raw);
    let parent = extract_parent(kind, raw, deleted_at_ms.is_some())?;

    Ok(PushItem {
        uid,
        updated_at_ms,
        deleted_at_ms,
        client_version,
        parent,
        payload: raw.clone(),
    })
}

fn extract_uid(raw: &Value) -> Result<Uuid, SyncError> {
    raw.get("uid")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::validation("missing uid"))
        .and_then(|s| {
            Uuid::parse_str(s).map_err(|_| SyncError::validation(format!("invalid uid: {s}")))
        })
}

/// Reads `updatedTs` (RFC 3339) if present, otherwise falls back to an
/// embedded `sync.updatedAtMs` integer.
fn extract_updated_at_ms(raw: &Value) -> Result<i64, SyncError> {
    if let Some(ts) = raw.get("updatedTs").and_then(Value::as_str) {
        return OffsetDateTime::parse(ts, &Rfc3339)
            .map(|dt| dt.unix_timestamp_nanos() / 1_000_000)
            .map(|ms| ms as i64)
            .map_err(|e| SyncError::validation(format!("invalid updatedTs '{ts}': {e}")));
    }
    if let Some(ms) = raw.pointer("/sync/updatedAtMs").and_then(Value::as_i64) {
        return Ok(ms);
    }
    Err(SyncError::validation(
        "missing updatedTs or sync.updatedAtMs",
    ))
}

fn extract_deleted_at_ms(raw: &Value) -> Option<i64> {
    let is_deleted = raw
        .pointer("/sync/isDeleted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !is_deleted {
        return None;
    }
    if let Some(ts) = raw.pointer("/sync/deletedAt").and_then(Value::as_str) {
        if let Ok(dt) = OffsetDateTime::parse(ts, &Rfc3339) {
            return Some((dt.unix_timestamp_nanos() / 1_000_000) as i64);
        }
    }
    Some(ledgersync_core::now_ms())
}

fn extract_client_version(raw: &Value) -> i64 {
    raw.pointer("/sync/version")
        .and_then(Value::as_i64)
        .unwrap_or(1)
        .max(1)
}

fn extract_parent(kind: EntityKind, raw: &Value, is_delete: bool) -> Result<Option<ParentRef>, SyncError> {
    if !kind.has_parent() {
        return Ok(None);
    }

    // Tombstoning a child never requires a live parent reference — only
    // creation/update does, and only for kinds where the parent is
    // mandatory in the first place.
    if is_delete || !kind.requires_parent() {
        return Ok(extract_parent_uid(kind, raw)
            .ok()
            .flatten()
            .map(|(parent_kind, uid)| ParentRef {
                kind: parent_kind,
                uid,
            }));
    }

    let (parent_kind, uid) = extract_parent_uid(kind, raw)?
        .ok_or_else(|| SyncError::validation(format!("{kind} requires a parent reference")))?;
    Ok(Some(ParentRef {
        kind: parent_kind,
        uid,
    }))
}

/// Resolves the parent (kind, uid) pair for kinds that carry one.
/// `comment` is the one kind whose parent kind is per-row
/// (`parentType`/`parentUid`); the rest have a fixed parent kind and use a
/// single `<parentKind>Uid` field (e.g. `chatUid`, `taskListUid`).
fn extract_parent_uid(
    kind: EntityKind,
    raw: &Value,
) -> Result<Option<(EntityKind, Uuid)>, SyncError> {
    match kind {
        EntityKind::Comment => {
            let parent_type = raw.get("parentType").and_then(Value::as_str);
            let parent_uid = raw.get("parentUid").and_then(Value::as_str);
            match (parent_type, parent_uid) {
                (Some(t), Some(u)) => {
                    let parent_kind: EntityKind = t
                        .parse()
                        .map_err(|_| SyncError::validation(format!("unknown parentType: {t}")))?;
                    let uid = Uuid::parse_str(u)
                        .map_err(|_| SyncError::validation(format!("invalid parentUid: {u}")))?;
                    Ok(Some((parent_kind, uid)))
                }
                (None, None) => Ok(None),
                _ => Err(SyncError::validation(
                    "comment requires both parentType and parentUid",
                )),
            }
        }
        EntityKind::ChatMessage => parse_fixed_parent(raw, "chatUid", EntityKind::Chat),
        EntityKind::Task => parse_fixed_parent(raw, "taskListUid", EntityKind::TaskList),
        EntityKind::TaskListCategory => {
            parse_fixed_parent(raw, "taskListUid", EntityKind::TaskList)
        }
        _ => Ok(None),
    }
}

fn parse_fixed_parent(
    raw: &Value,
    field: &str,
    parent_kind: EntityKind,
) -> Result<Option<(EntityKind, Uuid)>, SyncError> {
    match raw.get(field).and_then(Value::as_str) {
        Some(u) => {
            let uid = Uuid::parse_str(u)
                .map_err(|_| SyncError::validation(format!("invalid {field}: {u}")))?;
            Ok(Some((parent_kind, uid)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_minimal_note() {
        let uid = Uuid::new_v4();
        let raw = json!({ "uid": uid.to_string(), "updatedTs": "2025-11-03T10:00:00Z", "title": "T" });
        let item = extract(EntityKind::Note, &raw).unwrap();
        assert_eq!(item.uid, uid);
        assert_eq!(item.client_version, 1);
        assert!(item.deleted_at_ms.is_none());
        assert_eq!(item.payload, raw);
    }

    #[test]
    fn missing_uid_fails() {
        let raw = json!({ "updatedTs": "2025-11-03T10:00:00Z" });
        assert!(extract(EntityKind::Note, &raw).is_err());
    }

    #[test]
    fn missing_timestamp_fails() {
        let raw = json!({ "uid": Uuid::new_v4().to_string() });
        assert!(extract(EntityKind::Note, &raw).is_err());
    }

    #[test]
    fn comment_requires_parent_fields_unless_tombstoned() {
        let raw = json!({ "uid": Uuid::new_v4().to_string(), "updatedTs": "2025-11-03T10:00:00Z" });
        assert!(extract(EntityKind::Comment, &raw).is_err());

        let tombstone = json!({
            "uid": Uuid::new_v4().to_string(),
            "updatedTs": "2025-11-03T10:00:00Z",
            "sync": { "isDeleted": true, "deletedAt": "2025-11-03T10:00:00Z" },
        });
        assert!(extract(EntityKind::Comment, &tombstone).is_ok());
    }

    #[test]
    fn comment_parent_kind_is_per_row() {
        let parent = Uuid::new_v4();
        let raw = json!({
            "uid": Uuid::new_v4().to_string(),
            "updatedTs": "2025-11-03T10:00:00Z",
            "parentType": "task",
            "parentUid": parent.to_string(),
        });
        let item = extract(EntityKind::Comment, &raw).unwrap();
        let parent_ref = item.parent.unwrap();
        assert_eq!(parent_ref.kind, EntityKind::Task);
        assert_eq!(parent_ref.uid, parent);
    }

    #[test]
    fn task_parent_is_optional() {
        let raw = json!({
            "uid": Uuid::new_v4().to_string(),
            "updatedTs": "2025-11-03T10:00:00Z",
        });
        let item = extract(EntityKind::Task, &raw).unwrap();
        assert!(item.parent.is_none());
    }

    #[test]
    fn task_list_category_parent_is_optional() {
        let raw = json!({
            "uid": Uuid::new_v4().to_string(),
            "updatedTs": "2025-11-03T10:00:00Z",
        });
        let item = extract(EntityKind::TaskListCategory, &raw).unwrap();
        assert!(item.parent.is_none());
    }

    #[test]
    fn chat_message_uses_fixed_parent_field() {
        let chat = Uuid::new_v4();
        let raw = json!({
            "uid": Uuid::new_v4().to_string(),
            "updatedTs": "2025-11-03T10:00:00Z",
            "chatUid": chat.to_string(),
        });
        let item = extract(EntityKind::ChatMessage, &raw).unwrap();
        assert_eq!(item.parent.unwrap().uid, chat);
    }

    #[test]
    fn sync_updated_at_ms_fallback_is_honored() {
        let raw = json!({
            "uid": Uuid::new_v4().to_string(),
            "sync": { "updatedAtMs": 1_700_000_000_000_i64 },
        });
        let item = extract(EntityKind::Note, &raw).unwrap();
        assert_eq!(item.updated_at_ms, 1_700_000_000_000);
    }

    #[test]
    fn unknown_keys_are_preserved_verbatim() {
        let raw = json!({
            "uid": Uuid::new_v4().to_string(),
            "updatedTs": "2025-11-03T10:00:00Z",
            "pinned": false,
            "nested": { "a": [1, 2, 3] },
        });
        let item = extract(EntityKind::Note, &raw).unwrap();
        assert_eq!(item.payload, raw);
    }
}

//! Storage types shared by the [`crate::SyncStore`] and [`crate::OwnerStore`]
//! traits.

use std::collections::HashMap;

use ledgersync_core::EntityKind;
use serde_json::Value;
use uuid::Uuid;

/// A parent reference carried by child kinds (`comment`, `chat_message`,
/// `task`, `task_list_category`). `comment` is the only kind whose parent
/// `kind` varies per row; the others have a fixed parent kind enforced by
/// [`EntityKind::fixed_parent_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRef {
    pub kind: EntityKind,
    pub uid: Uuid,
}

/// A single authoritative sync row as stored for one `(owner, kind, uid)`.
#[derive(Debug, Clone)]
pub struct SyncRow {
    pub owner_id: String,
    pub kind: EntityKind,
    pub uid: Uuid,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
    pub version: i64,
    pub parent: Option<ParentRef>,
    /// The verbatim client payload, including any fields the server does
    /// not interpret. Preserved byte-for-byte across upserts.
    pub payload: Value,
}

impl SyncRow {
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.deleted_at_ms.is_some()
    }
}

/// One item of a `push` batch, already extracted by the payload extractor
/// (component C2). `client_version` is advisory only — the LWW upsert rule
/// never trusts it for anything but the initial insert's floor.
#[derive(Debug, Clone)]
pub struct PushItem {
    pub uid: Uuid,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
    pub client_version: i64,
    pub parent: Option<ParentRef>,
    pub payload: Value,
}

/// The outcome of upserting a single [`PushItem`]: either the row's
/// server-authoritative `(version, updatedAtMs)` after the write, or a
/// per-item error that does not abort the rest of the batch.
#[derive(Debug, Clone)]
pub struct PushAck {
    pub uid: Option<Uuid>,
    pub version: Option<i64>,
    pub updated_at_ms: Option<i64>,
    pub error: Option<String>,
}

impl PushAck {
    #[must_use]
    pub fn ok(uid: Uuid, version: i64, updated_at_ms: i64) -> Self {
        Self {
            uid: Some(uid),
            version: Some(version),
            updated_at_ms: Some(updated_at_ms),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(uid: Option<Uuid>, error: impl Into<String>) -> Self {
        Self {
            uid,
            version: None,
            updated_at_ms: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A tombstoned row surfaced on `pull`.
#[derive(Debug, Clone, Copy)]
pub struct DeleteMarker {
    pub uid: Uuid,
    pub deleted_at_ms: i64,
}

/// One page of a `pull` response.
#[derive(Debug, Clone, Default)]
pub struct PullPage {
    pub upserts: Vec<SyncRow>,
    pub deletes: Vec<DeleteMarker>,
    /// Present only when at least one row was returned; absent signals
    /// end-of-stream for now.
    pub next_cursor: Option<String>,
}

/// Per-owner state tracked by the epoch & wipe coordinator (C4).
#[derive(Debug, Clone)]
pub struct OwnerState {
    pub owner_id: String,
    pub epoch: i64,
    pub last_wipe_at_ms: Option<i64>,
    pub last_wipe_by: Option<String>,
}

impl OwnerState {
    #[must_use]
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            epoch: 1,
            last_wipe_at_ms: None,
            last_wipe_by: None,
        }
    }
}

/// The result of a `wipe(owner, confirm)` call.
#[derive(Debug, Clone)]
pub struct WipeOutcome {
    pub new_epoch: i64,
    pub deleted_counts_by_kind: HashMap<EntityKind, u64>,
}

/// Outcome of deleting a `task_list`: orphaning its child tasks and
/// tombstoning the list itself, atomically.
#[derive(Debug, Clone, Copy)]
pub struct ListDeletionOutcome {
    pub orphaned_task_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_ack_ok_has_no_error() {
        let uid = Uuid::new_v4();
        let ack = PushAck::ok(uid, 2, 1_700_000_000_000);
        assert!(ack.is_ok());
        assert_eq!(ack.version, Some(2));
    }

    #[test]
    fn push_ack_failed_carries_message() {
        let ack = PushAck::failed(None, "invalid payload");
        assert!(!ack.is_ok());
        assert_eq!(ack.error.as_deref(), Some("invalid payload"));
    }

    #[test]
    fn sync_row_tombstone_predicate() {
        let row = SyncRow {
            owner_id: "u1".into(),
            kind: EntityKind::Note,
            uid: Uuid::new_v4(),
            updated_at_ms: 1,
            deleted_at_ms: Some(2),
            version: 1,
            parent: None,
            payload: serde_json::json!({}),
        };
        assert!(row.is_tombstone());
    }

    #[test]
    fn owner_state_starts_at_epoch_one() {
        let state = OwnerState::new("u1");
        assert_eq!(state.epoch, 1);
        assert!(state.last_wipe_at_ms.is_none());
    }
}

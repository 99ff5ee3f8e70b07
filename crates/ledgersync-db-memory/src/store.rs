//! Lock-free in-memory implementation of [`SyncStore`] and [`OwnerStore`],
//! backed by [`dashmap::DashMap`]. Intended for tests and local development;
//! `ledgersync-db-postgres` is the durable counterpart.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ledgersync_core::EntityKind;
use ledgersync_storage::{
    ListDeletionOutcome, OwnerState, OwnerStore, ParentRef, PullPage, PushAck, PushItem,
    StorageError, SyncRow, SyncStore, WipeOutcome,
};
use std::collections::HashMap;
use uuid::Uuid;

type RowKey = (String, EntityKind, Uuid);

/// In-memory backend for both the LWW store (C3) and the epoch & wipe
/// coordinator (C4). A single instance owns both tables because wipe must
/// see and mutate rows across every kind for one owner.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: DashMap<RowKey, SyncRow>,
    owners: DashMap<String, OwnerState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn parent_live(&self, owner: &str, parent: &ParentRef) -> bool {
        self.rows
            .get(&(owner.to_string(), parent.kind, parent.uid))
            .map(|row| !row.is_tombstone())
            .unwrap_or(false)
    }

    /// Applies the LWW upsert rule to a single key, returning the
    /// authoritative `(version, updatedAtMs)` after the write.
    fn upsert(&self, owner: &str, kind: EntityKind, item: PushItem) -> (i64, i64) {
        let key = (owner.to_string(), kind, item.uid);
        match self.rows.entry(key) {
            Entry::Vacant(slot) => {
                let version = item.client_version.max(1);
                let row = SyncRow {
                    owner_id: owner.to_string(),
                    kind,
                    uid: item.uid,
                    updated_at_ms: item.updated_at_ms,
                    deleted_at_ms: item.deleted_at_ms,
                    version,
                    parent: item.parent,
                    payload: item.payload,
                };
                let out = (row.version, row.updated_at_ms);
                slot.insert(row);
                out
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                if item.updated_at_ms > existing.updated_at_ms {
                    let version = existing.version + 1;
                    let row = SyncRow {
                        owner_id: owner.to_string(),
                        kind,
                        uid: item.uid,
                        updated_at_ms: item.updated_at_ms,
                        deleted_at_ms: item.deleted_at_ms,
                        version,
                        parent: item.parent,
                        payload: item.payload,
                    };
                    let out = (row.version, row.updated_at_ms);
                    slot.insert(row);
                    out
                } else {
                    (existing.version, existing.updated_at_ms)
                }
            }
        }
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    #[tracing::instrument(skip(self, items), fields(owner, kind = %kind, count = items.len()))]
    async fn push(
        &self,
        owner: &str,
        kind: EntityKind,
        items: Vec<PushItem>,
    ) -> Result<Vec<PushAck>, StorageError> {
        let mut acks = Vec::with_capacity(items.len());
        for item in items {
            if let Some(parent) = item.parent.as_ref() {
                let tombstoning = item.deleted_at_ms.is_some();
                if !tombstoning && !self.parent_live(owner, parent) {
                    acks.push(PushAck::failed(
                        Some(item.uid),
                        format!("parent not found: {}/{}", parent.kind, parent.uid),
                    ));
                    continue;
                }
            }
            let uid = item.uid;
            let (version, updated_at_ms) = self.upsert(owner, kind, item);
            acks.push(PushAck::ok(uid, version, updated_at_ms));
        }
        Ok(acks)
    }

    async fn pull(
        &self,
        owner: &str,
        kind: EntityKind,
        cursor_ms: i64,
        cursor_uid: Uuid,
        limit: u32,
    ) -> Result<PullPage, StorageError> {
        let mut matching: Vec<SyncRow> = self
            .rows
            .iter()
            .filter(|entry| {
                let (o, k, _) = entry.key();
                o == owner
                    && *k == kind
                    && (entry.updated_at_ms, entry.uid) > (cursor_ms, cursor_uid)
            })
            .map(|entry| entry.value().clone())
            .collect();

        matching.sort_by_key(|row| (row.updated_at_ms, row.uid));
        matching.truncate(limit as usize);

        let next_cursor = matching.last().map(|row| {
            ledgersync_core::Cursor::new(row.updated_at_ms, row.uid).encode()
        });

        let mut page = PullPage {
            upserts: Vec::new(),
            deletes: Vec::new(),
            next_cursor,
        };
        for row in matching {
            if let Some(deleted_at_ms) = row.deleted_at_ms {
                page.deletes.push(ledgersync_storage::DeleteMarker {
                    uid: row.uid,
                    deleted_at_ms,
                });
            } else {
                page.upserts.push(row);
            }
        }
        Ok(page)
    }

    async fn push_one_with_precondition(
        &self,
        owner: &str,
        kind: EntityKind,
        item: PushItem,
        expected_version: Option<i64>,
        explicit_if_match: bool,
    ) -> Result<PushAck, StorageError> {
        if let Some(expected) = expected_version {
            let key = (owner.to_string(), kind, item.uid);
            let actual = self
                .rows
                .get(&key)
                .map(|row| row.version)
                .ok_or_else(|| StorageError::not_found(kind.as_str(), item.uid.to_string()))?;
            if actual != expected {
                return Err(if explicit_if_match {
                    StorageError::precondition_failed(expected, actual)
                } else {
                    StorageError::version_conflict(expected, actual)
                });
            }
        }
        if let Some(parent) = item.parent.as_ref() {
            let tombstoning = item.deleted_at_ms.is_some();
            if !tombstoning && !self.parent_live(owner, parent) {
                return Err(StorageError::parent_not_found(
                    parent.kind.as_str(),
                    parent.uid.to_string(),
                ));
            }
        }
        let uid = item.uid;
        let (version, updated_at_ms) = self.upsert(owner, kind, item);
        Ok(PushAck::ok(uid, version, updated_at_ms))
    }

    async fn delete_task_list_cascading(
        &self,
        owner: &str,
        list_uid: Uuid,
        deleted_at_ms: i64,
    ) -> Result<ListDeletionOutcome, StorageError> {
        let list_key = (owner.to_string(), EntityKind::TaskList, list_uid);
        {
            let mut list_row = self
                .rows
                .get_mut(&list_key)
                .ok_or_else(|| StorageError::not_found("task_list", list_uid.to_string()))?;
            if deleted_at_ms > list_row.updated_at_ms {
                list_row.version += 1;
                list_row.updated_at_ms = deleted_at_ms;
            }
            list_row.deleted_at_ms = Some(deleted_at_ms);
        }

        let mut orphaned = 0u64;
        for mut entry in self.rows.iter_mut() {
            let (o, k, _) = entry.key().clone();
            if o == owner
                && k == EntityKind::Task
                && entry
                    .parent
                    .is_some_and(|p| p.kind == EntityKind::TaskList && p.uid == list_uid)
            {
                entry.parent = None;
                orphaned += 1;
            }
        }

        Ok(ListDeletionOutcome {
            orphaned_task_count: orphaned,
        })
    }

    async fn get_one(
        &self,
        owner: &str,
        kind: EntityKind,
        uid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<SyncRow>, StorageError> {
        let row = self.rows.get(&(owner.to_string(), kind, uid));
        Ok(row
            .filter(|r| include_deleted || !r.is_tombstone())
            .map(|r| r.clone()))
    }
}

#[async_trait]
impl OwnerStore for MemoryStore {
    async fn get_or_create(&self, owner: &str) -> Result<OwnerState, StorageError> {
        let entry = self
            .owners
            .entry(owner.to_string())
            .or_insert_with(|| OwnerState::new(owner));
        Ok(entry.clone())
    }

    async fn wipe(&self, owner: &str) -> Result<WipeOutcome, StorageError> {
        let new_epoch = {
            let mut state = self
                .owners
                .entry(owner.to_string())
                .or_insert_with(|| OwnerState::new(owner));
            state.epoch += 1;
            state.last_wipe_at_ms = Some(ledgersync_core::now_ms());
            state.last_wipe_by = Some(owner.to_string());
            state.epoch
        };

        let mut deleted_counts_by_kind: HashMap<EntityKind, u64> = HashMap::new();
        // Children before parents, so downstream durable backends with real
        // foreign keys can follow this same order.
        let deletion_order = [
            EntityKind::Comment,
            EntityKind::ChatMessage,
            EntityKind::Task,
            EntityKind::TaskListCategory,
            EntityKind::Chat,
            EntityKind::TaskList,
            EntityKind::Note,
        ];
        for kind in deletion_order {
            let keys: Vec<RowKey> = self
                .rows
                .iter()
                .filter(|entry| {
                    let (o, k, _) = entry.key();
                    o == owner && *k == kind
                })
                .map(|entry| entry.key().clone())
                .collect();
            let count = keys.len() as u64;
            for key in keys {
                self.rows.remove(&key);
            }
            deleted_counts_by_kind.insert(kind, count);
        }

        Ok(WipeOutcome {
            new_epoch,
            deleted_counts_by_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(uid: Uuid, updated_at_ms: i64) -> PushItem {
        PushItem {
            uid,
            updated_at_ms,
            deleted_at_ms: None,
            client_version: 1,
            parent: None,
            payload: json!({"title": "hi"}),
        }
    }

    #[tokio::test]
    async fn first_push_creates_row_at_version_one() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        let acks = store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();
        assert!(acks[0].is_ok());
        assert_eq!(acks[0].version, Some(1));
    }

    #[tokio::test]
    async fn stale_push_is_a_no_op() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(uid, 2000)])
            .await
            .unwrap();
        let acks = store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();
        assert_eq!(acks[0].version, Some(1));
        assert_eq!(acks[0].updated_at_ms, Some(2000));
    }

    #[tokio::test]
    async fn equal_timestamp_push_is_idempotent() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();
        let acks = store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();
        assert_eq!(acks[0].version, Some(1));
    }

    #[tokio::test]
    async fn strictly_newer_push_bumps_version() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();
        let acks = store
            .push("owner1", EntityKind::Note, vec![item(uid, 2000)])
            .await
            .unwrap();
        assert_eq!(acks[0].version, Some(2));
        assert_eq!(acks[0].updated_at_ms, Some(2000));
    }

    #[tokio::test]
    async fn child_push_without_live_parent_fails() {
        let store = MemoryStore::new();
        let mut child = item(Uuid::new_v4(), 1000);
        child.parent = Some(ParentRef {
            kind: EntityKind::TaskList,
            uid: Uuid::new_v4(),
        });
        let acks = store
            .push("owner1", EntityKind::Task, vec![child])
            .await
            .unwrap();
        assert!(!acks[0].is_ok());
    }

    #[tokio::test]
    async fn tombstoning_child_bypasses_parent_check() {
        let store = MemoryStore::new();
        let mut child = item(Uuid::new_v4(), 1000);
        child.deleted_at_ms = Some(1000);
        child.parent = Some(ParentRef {
            kind: EntityKind::TaskList,
            uid: Uuid::new_v4(),
        });
        let acks = store
            .push("owner1", EntityKind::Task, vec![child])
            .await
            .unwrap();
        assert!(acks[0].is_ok());
    }

    #[tokio::test]
    async fn precondition_mismatch_reports_explicit_if_match_as_412() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();

        let err = store
            .push_one_with_precondition("owner1", EntityKind::Note, item(uid, 2000), Some(5), true)
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
    }

    #[tokio::test]
    async fn precondition_mismatch_without_if_match_is_version_conflict() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();

        let err = store
            .push_one_with_precondition("owner1", EntityKind::Note, item(uid, 2000), Some(5), false)
            .await
            .unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn pull_returns_upserts_and_deletes_separately() {
        let store = MemoryStore::new();
        let live = Uuid::new_v4();
        let gone = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(live, 1000)])
            .await
            .unwrap();
        let mut tombstone = item(gone, 2000);
        tombstone.deleted_at_ms = Some(2000);
        store
            .push("owner1", EntityKind::Note, vec![tombstone])
            .await
            .unwrap();

        let page = store
            .pull("owner1", EntityKind::Note, 0, Uuid::nil(), 500)
            .await
            .unwrap();
        assert_eq!(page.upserts.len(), 1);
        assert_eq!(page.deletes.len(), 1);
        assert!(page.next_cursor.is_some());
    }

    #[tokio::test]
    async fn pull_respects_cursor_exclusivity() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();
        let page = store
            .pull("owner1", EntityKind::Note, 1000, uid, 500)
            .await
            .unwrap();
        assert!(page.upserts.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn wipe_increments_epoch_and_clears_rows() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::Note, vec![item(uid, 1000)])
            .await
            .unwrap();
        store.get_or_create("owner1").await.unwrap();

        let outcome = store.wipe("owner1").await.unwrap();
        assert_eq!(outcome.new_epoch, 2);
        assert_eq!(outcome.deleted_counts_by_kind[&EntityKind::Note], 1);

        let page = store
            .pull("owner1", EntityKind::Note, 0, Uuid::nil(), 500)
            .await
            .unwrap();
        assert!(page.upserts.is_empty());
    }

    #[tokio::test]
    async fn wipe_on_untouched_owner_lazily_creates_at_epoch_two() {
        let store = MemoryStore::new();
        let outcome = store.wipe("fresh-owner").await.unwrap();
        assert_eq!(outcome.new_epoch, 2);
    }

    #[tokio::test]
    async fn deleting_task_list_orphans_its_tasks() {
        let store = MemoryStore::new();
        let list_uid = Uuid::new_v4();
        store
            .push("owner1", EntityKind::TaskList, vec![item(list_uid, 1000)])
            .await
            .unwrap();
        let mut task = item(Uuid::new_v4(), 1000);
        task.parent = Some(ParentRef {
            kind: EntityKind::TaskList,
            uid: list_uid,
        });
        store
            .push("owner1", EntityKind::Task, vec![task])
            .await
            .unwrap();

        let outcome = store
            .delete_task_list_cascading("owner1", list_uid, 2000)
            .await
            .unwrap();
        assert_eq!(outcome.orphaned_task_count, 1);

        let list = store
            .get_one("owner1", EntityKind::TaskList, list_uid, true)
            .await
            .unwrap()
            .unwrap();
        assert!(list.is_tombstone());
    }
}

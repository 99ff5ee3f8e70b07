//! Raw SQL for the `sync_rows`/`owner_state` tables.
//!
//! Queries are issued via `sqlx_core::query`/`query_scalar` directly against
//! an `Executor`, not through the `sqlx` facade or `sqlx-macros` compile-time
//! checked macros (this backend avoids both to sidestep the SQLite feature
//! conflict `sqlx-macros` would pull in). Rows are decoded by hand from
//! `PgRow` rather than via `#[derive(FromRow)]`, for the same reason.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx_core::executor::Executor;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgRow, PgTransaction, Postgres};
use uuid::Uuid;

use ledgersync_core::EntityKind;
use ledgersync_storage::{
    DeleteMarker, ListDeletionOutcome, OwnerState, ParentRef, PullPage, PushAck, PushItem,
    StorageError, SyncRow, WipeOutcome,
};

type Result<T> = std::result::Result<T, StorageError>;

fn row_to_sync_row(row: &PgRow, owner: &str, kind: EntityKind) -> Result<SyncRow> {
    let uid: Uuid = row
        .try_get("uid")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let updated_at_ms: i64 = row
        .try_get("updated_at_ms")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let deleted_at_ms: Option<i64> = row
        .try_get("deleted_at_ms")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let parent_kind: Option<String> = row
        .try_get("parent_kind")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let parent_uid: Option<Uuid> = row
        .try_get("parent_uid")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let payload: serde_json::Value = row
        .try_get("payload")
        .map_err(|e| StorageError::internal(e.to_string()))?;

    let parent = match (parent_kind, parent_uid) {
        (Some(k), Some(uid)) => Some(ParentRef {
            kind: EntityKind::from_str(&k)
                .map_err(|e| StorageError::internal(format!("corrupt parent_kind: {e}")))?,
            uid,
        }),
        _ => None,
    };

    Ok(SyncRow {
        owner_id: owner.to_string(),
        kind,
        uid,
        updated_at_ms,
        deleted_at_ms,
        version,
        parent,
        payload,
    })
}

const UPSERT_SQL: &str = r#"
INSERT INTO sync_rows
    (owner_id, kind, uid, updated_at_ms, deleted_at_ms, version, parent_kind, parent_uid, payload)
VALUES
    ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (owner_id, kind, uid) DO UPDATE SET
    version = CASE WHEN EXCLUDED.updated_at_ms > sync_rows.updated_at_ms
                   THEN sync_rows.version + 1 ELSE sync_rows.version END,
    updated_at_ms = CASE WHEN EXCLUDED.updated_at_ms > sync_rows.updated_at_ms
                   THEN EXCLUDED.updated_at_ms ELSE sync_rows.updated_at_ms END,
    deleted_at_ms = CASE WHEN EXCLUDED.updated_at_ms > sync_rows.updated_at_ms
                   THEN EXCLUDED.deleted_at_ms ELSE sync_rows.deleted_at_ms END,
    parent_kind = CASE WHEN EXCLUDED.updated_at_ms > sync_rows.updated_at_ms
                   THEN EXCLUDED.parent_kind ELSE sync_rows.parent_kind END,
    parent_uid = CASE WHEN EXCLUDED.updated_at_ms > sync_rows.updated_at_ms
                   THEN EXCLUDED.parent_uid ELSE sync_rows.parent_uid END,
    payload = CASE WHEN EXCLUDED.updated_at_ms > sync_rows.updated_at_ms
                   THEN EXCLUDED.payload ELSE sync_rows.payload END
RETURNING version, updated_at_ms
"#;

/// Upserts one row under LWW semantics and returns the row's resulting
/// `(version, updated_at_ms)` — which may be the pre-existing values if the
/// incoming write lost the race.
pub async fn upsert_row<'e, E>(
    executor: E,
    owner: &str,
    kind: EntityKind,
    item: &PushItem,
) -> Result<(i64, i64)>
where
    E: Executor<'e, Database = Postgres>,
{
    let (parent_kind, parent_uid) = match &item.parent {
        Some(p) => (Some(p.kind.as_str()), Some(p.uid)),
        None => (None, None),
    };

    let row = query(UPSERT_SQL)
        .bind(owner)
        .bind(kind.as_str())
        .bind(item.uid)
        .bind(item.updated_at_ms)
        .bind(item.deleted_at_ms)
        .bind(item.client_version.max(1))
        .bind(parent_kind)
        .bind(parent_uid)
        .bind(&item.payload)
        .fetch_one(executor)
        .await
        .map_err(|e| StorageError::internal(e.to_string()))?;

    let version: i64 = row
        .try_get("version")
        .map_err(|e| StorageError::internal(e.to_string()))?;
    let updated_at_ms: i64 = row
        .try_get("updated_at_ms")
        .map_err(|e| StorageError::internal(e.to_string()))?;

    Ok((version, updated_at_ms))
}

/// Whether a live (non-tombstoned) row exists at `owner`/`parent`.
pub async fn parent_is_live<'e, E>(executor: E, owner: &str, parent: &ParentRef) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let found: Option<i32> = query_scalar(
        "SELECT 1 FROM sync_rows \
         WHERE owner_id = $1 AND kind = $2 AND uid = $3 AND deleted_at_ms IS NULL",
    )
    .bind(owner)
    .bind(parent.kind.as_str())
    .bind(parent.uid)
    .fetch_optional(executor)
    .await
    .map_err(|e| StorageError::internal(e.to_string()))?;

    Ok(found.is_some())
}

/// Fetches one row, optionally including tombstones.
pub async fn get_one<'e, E>(
    executor: E,
    owner: &str,
    kind: EntityKind,
    uid: Uuid,
    include_deleted: bool,
) -> Result<Option<SyncRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = if include_deleted {
        "SELECT * FROM sync_rows WHERE owner_id = $1 AND kind = $2 AND uid = $3"
    } else {
        "SELECT * FROM sync_rows WHERE owner_id = $1 AND kind = $2 AND uid = $3 AND deleted_at_ms IS NULL"
    };

    let row = query(sql)
        .bind(owner)
        .bind(kind.as_str())
        .bind(uid)
        .fetch_optional(executor)
        .await
        .map_err(|e| StorageError::internal(e.to_string()))?;

    row.map(|r| row_to_sync_row(&r, owner, kind)).transpose()
}

/// Checks an optional `If-Match` precondition against the row locked
/// `FOR UPDATE`, checks the parent (tombstoning bypasses it), then upserts —
/// all inside the caller's transaction so the check-then-write is atomic.
pub async fn push_one_with_precondition(
    tx: &mut PgTransaction<'_>,
    owner: &str,
    kind: EntityKind,
    item: &PushItem,
    expected_version: Option<i64>,
    explicit_if_match: bool,
) -> Result<PushAck> {
    if let Some(expected) = expected_version {
        let actual: Option<i64> = query_scalar(
            "SELECT version FROM sync_rows WHERE owner_id = $1 AND kind = $2 AND uid = $3 FOR UPDATE",
        )
        .bind(owner)
        .bind(kind.as_str())
        .bind(item.uid)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| StorageError::internal(e.to_string()))?;

        match actual {
            None => return Err(StorageError::not_found(kind.as_str(), item.uid.to_string())),
            Some(actual) if actual != expected => {
                return Err(if explicit_if_match {
                    StorageError::precondition_failed(expected, actual)
                } else {
                    StorageError::version_conflict(expected, actual)
                });
            }
            Some(_) => {}
        }
    }

    if let Some(parent) = &item.parent
        && item.deleted_at_ms.is_none()
        && !parent_is_live(&mut **tx, owner, parent).await?
    {
        return Ok(ack_failed(
            item.uid,
            format!("parent not found: {}/{}", parent.kind.as_str(), parent.uid),
        ));
    }

    let (version, updated_at_ms) = upsert_row(&mut **tx, owner, kind, item).await?;
    Ok(ack_ok(item.uid, version, updated_at_ms))
}

/// Pulls a page of rows strictly after `(cursor_ms, cursor_uid)`.
pub async fn pull_page<'e, E>(
    executor: E,
    owner: &str,
    kind: EntityKind,
    cursor_ms: i64,
    cursor_uid: Uuid,
    limit: u32,
) -> Result<PullPage>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = query(
        "SELECT * FROM sync_rows \
         WHERE owner_id = $1 AND kind = $2 AND (updated_at_ms, uid) > ($3, $4) \
         ORDER BY updated_at_ms, uid \
         LIMIT $5",
    )
    .bind(owner)
    .bind(kind.as_str())
    .bind(cursor_ms)
    .bind(cursor_uid)
    .bind(i64::from(limit))
    .fetch_all(executor)
    .await
    .map_err(|e| StorageError::internal(e.to_string()))?;

    let mut upserts = Vec::new();
    let mut deletes = Vec::new();
    let mut last: Option<(i64, Uuid)> = None;

    for row in &rows {
        let sync_row = row_to_sync_row(row, owner, kind)?;
        last = Some((sync_row.updated_at_ms, sync_row.uid));
        if let Some(deleted_at_ms) = sync_row.deleted_at_ms {
            deletes.push(DeleteMarker {
                uid: sync_row.uid,
                deleted_at_ms,
            });
        } else {
            upserts.push(sync_row);
        }
    }

    let next_cursor = last.map(|(ms, uid)| ledgersync_core::Cursor::new(ms, uid).encode());

    Ok(PullPage {
        upserts,
        deletes,
        next_cursor,
    })
}

/// Tombstones a task list and nulls the `parent` of every live task that
/// referenced it, as one atomic operation.
pub async fn delete_task_list_cascading(
    tx: &mut PgTransaction<'_>,
    owner: &str,
    list_uid: Uuid,
    deleted_at_ms: i64,
) -> Result<ListDeletionOutcome> {
    let existing: Option<i64> = query_scalar(
        "SELECT version FROM sync_rows WHERE owner_id = $1 AND kind = 'task_list' AND uid = $2 FOR UPDATE",
    )
    .bind(owner)
    .bind(list_uid)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| StorageError::internal(e.to_string()))?;

    if existing.is_none() {
        return Err(StorageError::not_found("task_list", list_uid.to_string()));
    }

    query(
        "UPDATE sync_rows SET \
            deleted_at_ms = $3, \
            updated_at_ms = GREATEST(updated_at_ms, $3), \
            version = version + 1 \
         WHERE owner_id = $1 AND kind = 'task_list' AND uid = $2",
    )
    .bind(owner)
    .bind(list_uid)
    .bind(deleted_at_ms)
    .execute(&mut **tx)
    .await
    .map_err(|e| StorageError::internal(e.to_string()))?;

    let orphaned = query(
        "UPDATE sync_rows SET parent_kind = NULL, parent_uid = NULL, version = version + 1 \
         WHERE owner_id = $1 AND kind = 'task' AND parent_kind = 'task_list' AND parent_uid = $2 \
           AND deleted_at_ms IS NULL",
    )
    .bind(owner)
    .bind(list_uid)
    .execute(&mut **tx)
    .await
    .map_err(|e| StorageError::internal(e.to_string()))?;

    Ok(ListDeletionOutcome {
        orphaned_task_count: orphaned.rows_affected(),
    })
}

/// The order child kinds must be deleted in during a wipe, so no row is
/// ever left referencing an already-deleted parent mid-wipe.
pub const WIPE_DELETION_ORDER: [EntityKind; 7] = [
    EntityKind::Comment,
    EntityKind::ChatMessage,
    EntityKind::Task,
    EntityKind::TaskListCategory,
    EntityKind::Chat,
    EntityKind::TaskList,
    EntityKind::Note,
];

pub async fn get_or_create_owner<'e, E>(executor: E, owner: &str) -> Result<OwnerState>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = query(
        "INSERT INTO owner_state (owner_id, epoch) VALUES ($1, 1) \
         ON CONFLICT (owner_id) DO UPDATE SET owner_id = owner_state.owner_id \
         RETURNING owner_id, epoch, last_wipe_at_ms, last_wipe_by",
    )
    .bind(owner)
    .fetch_one(executor)
    .await
    .map_err(|e| StorageError::internal(e.to_string()))?;

    row_to_owner_state(&row)
}

fn row_to_owner_state(row: &PgRow) -> Result<OwnerState> {
    Ok(OwnerState {
        owner_id: row
            .try_get("owner_id")
            .map_err(|e| StorageError::internal(e.to_string()))?,
        epoch: row
            .try_get("epoch")
            .map_err(|e| StorageError::internal(e.to_string()))?,
        last_wipe_at_ms: row
            .try_get("last_wipe_at_ms")
            .map_err(|e| StorageError::internal(e.to_string()))?,
        last_wipe_by: row
            .try_get("last_wipe_by")
            .map_err(|e| StorageError::internal(e.to_string()))?,
    })
}

/// Bumps the owner's epoch and deletes every row it owns, children before
/// parents. Lazily creates the owner at epoch 1 first if wipe is the very
/// first operation ever seen for it, then immediately bumps to epoch 2 —
/// achieved in one round trip via the `ON CONFLICT` upsert below.
pub async fn wipe_owner(
    tx: &mut PgTransaction<'_>,
    owner: &str,
    now_ms: i64,
) -> Result<WipeOutcome> {
    let new_epoch: i64 = query_scalar(
        "INSERT INTO owner_state (owner_id, epoch, last_wipe_at_ms, last_wipe_by) \
         VALUES ($1, 2, $2, $1) \
         ON CONFLICT (owner_id) DO UPDATE SET \
            epoch = owner_state.epoch + 1, \
            last_wipe_at_ms = $2, \
            last_wipe_by = $1 \
         RETURNING epoch",
    )
    .bind(owner)
    .bind(now_ms)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| StorageError::internal(e.to_string()))?;

    let mut deleted_counts_by_kind = HashMap::new();
    for kind in WIPE_DELETION_ORDER {
        let result = query("DELETE FROM sync_rows WHERE owner_id = $1 AND kind = $2")
            .bind(owner)
            .bind(kind.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| StorageError::internal(e.to_string()))?;
        deleted_counts_by_kind.insert(kind, result.rows_affected());
    }

    Ok(WipeOutcome {
        new_epoch,
        deleted_counts_by_kind,
    })
}

pub fn ack_ok(uid: Uuid, version: i64, updated_at_ms: i64) -> PushAck {
    PushAck::ok(uid, version, updated_at_ms)
}

pub fn ack_failed(uid: Uuid, error: impl Into<String>) -> PushAck {
    PushAck::failed(Some(uid), error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wipe_order_deletes_children_before_parents() {
        let comment_idx = WIPE_DELETION_ORDER
            .iter()
            .position(|k| *k == EntityKind::Comment)
            .unwrap();
        let task_idx = WIPE_DELETION_ORDER
            .iter()
            .position(|k| *k == EntityKind::Task)
            .unwrap();
        let list_idx = WIPE_DELETION_ORDER
            .iter()
            .position(|k| *k == EntityKind::TaskList)
            .unwrap();
        assert!(task_idx < list_idx);
        assert!(comment_idx < list_idx);
    }

    #[test]
    fn ack_ok_carries_version_and_timestamp() {
        let uid = Uuid::new_v4();
        let ack = ack_ok(uid, 3, 1_700_000_000_000);
        assert!(ack.is_ok());
        assert_eq!(ack.version, Some(3));
    }

    #[test]
    fn ack_failed_carries_uid_and_message() {
        let uid = Uuid::new_v4();
        let ack = ack_failed(uid, "parent not found: task_list/x");
        assert!(!ack.is_ok());
        assert_eq!(ack.uid, Some(uid));
    }
}

//! Storage traits for the sync storage abstraction layer.
//!
//! This module defines the contracts every storage backend (in-memory,
//! Postgres) must satisfy for the LWW store (C3) and the epoch & wipe
//! coordinator (C4).

use async_trait::async_trait;
use ledgersync_core::EntityKind;
use uuid::Uuid;

use crate::error::StorageError;
use crate::types::{
    ListDeletionOutcome, OwnerState, PullPage, PushAck, PushItem, WipeOutcome,
};

/// The LWW store: per-kind transactional upsert and tombstone-aware pull
/// (component C3).
///
/// Implementations must be thread-safe (`Send + Sync`) and must honor the
/// upsert contract exactly: strictly-greater `updatedAtMs` replaces the
/// row and bumps `version` by one; anything else is a no-op that reports
/// existing server values.
///
/// # Example
///
/// ```ignore
/// use ledgersync_storage::{SyncStore, StorageError};
///
/// async fn push_one(store: &dyn SyncStore, owner: &str, kind: EntityKind, item: PushItem) {
///     let acks = store.push(owner, kind, vec![item]).await.expect("batch commit");
///     assert!(acks[0].is_ok());
/// }
/// ```
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Applies a batch of pushes for one `(owner, kind)` in a single
    /// transaction, returning one ack per input item in order.
    ///
    /// Per-item failures (parent missing, upsert precondition) are
    /// reported through the corresponding [`PushAck`], not through the
    /// `Result`. The `Result` is reserved for failures that abort the
    /// whole batch: a lost connection or a failed commit.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the transaction cannot be committed.
    async fn push(
        &self,
        owner: &str,
        kind: EntityKind,
        items: Vec<PushItem>,
    ) -> Result<Vec<PushAck>, StorageError>;

    /// Returns one page of rows for `owner`/`kind` with
    /// `(updatedAtMs, uid) > cursor`, ordered lexicographically, capped at
    /// `limit` (already clamped into `[1, 1000]` by the caller).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] only for infrastructure failures.
    async fn pull(
        &self,
        owner: &str,
        kind: EntityKind,
        cursor_ms: i64,
        cursor_uid: Uuid,
        limit: u32,
    ) -> Result<PullPage, StorageError>;

    /// Applies a precondition-gated single-item mutation: proceeds only if
    /// the row's current version equals `expected_version` (a no-op check
    /// when `None`).
    ///
    /// `explicit_if_match` distinguishes a client-supplied `If-Match`
    /// header from an implicit optimistic-concurrency default (e.g.
    /// `merge`'s read-then-write baseline): a mismatch is reported as
    /// [`StorageError::PreconditionFailed`] (412) in the former case and
    /// [`StorageError::VersionConflict`] (409) in the latter.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PreconditionFailed`] or
    /// [`StorageError::VersionConflict`] if the precondition fails (per
    /// `explicit_if_match` above), or [`StorageError::NotFound`] if the
    /// row does not exist. Tombstone ("Gone") handling is a caller-level
    /// concern — this method does not itself distinguish live rows from
    /// tombstones.
    async fn push_one_with_precondition(
        &self,
        owner: &str,
        kind: EntityKind,
        item: PushItem,
        expected_version: Option<i64>,
        explicit_if_match: bool,
    ) -> Result<PushAck, StorageError>;

    /// Deletes a `task_list` and, in the same transaction, nulls the
    /// `taskListUid` field on every task that referenced it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for infrastructure failures. A missing
    /// list is reported as [`StorageError::NotFound`].
    async fn delete_task_list_cascading(
        &self,
        owner: &str,
        list_uid: Uuid,
        deleted_at_ms: i64,
    ) -> Result<ListDeletionOutcome, StorageError>;

    /// Reads a single row back, including tombstones when
    /// `include_deleted` is set. Used by single-item REST handlers.
    async fn get_one(
        &self,
        owner: &str,
        kind: EntityKind,
        uid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<crate::types::SyncRow>, StorageError>;
}

/// The epoch & wipe coordinator (C4): owner state lifecycle and the
/// destructive `wipe` operation.
#[async_trait]
pub trait OwnerStore: Send + Sync {
    /// Returns the owner's current state, lazily creating it with
    /// `epoch = 1` if this is the first time this owner has been seen.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] for infrastructure failures.
    async fn get_or_create(&self, owner: &str) -> Result<OwnerState, StorageError>;

    /// Atomically increments the owner's epoch, records the wipe
    /// timestamp/actor, and deletes every entity row belonging to this
    /// owner across all kinds (children before parents). Returns the new
    /// epoch and per-kind deletion counts.
    ///
    /// Session invalidation is the caller's responsibility — it happens
    /// after this call commits, via the session store, not inside this
    /// trait.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the transaction cannot be committed.
    async fn wipe(&self, owner: &str) -> Result<WipeOutcome, StorageError>;
}

// Ensure traits are object-safe by using them as trait objects.
#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_sync_store_object_safe(_: &dyn SyncStore) {}
    fn _assert_owner_store_object_safe(_: &dyn OwnerStore) {}
}

//! [`PostgresStore`]: the durable `SyncStore`/`OwnerStore` implementation.

use async_trait::async_trait;
use ledgersync_core::{EntityKind, now_ms};
use ledgersync_storage::{
    ListDeletionOutcome, OwnerState, OwnerStore, PullPage, PushAck, PushItem, StorageError,
    SyncRow, SyncStore, WipeOutcome,
};
use sqlx_postgres::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;
use crate::queries::sync as queries;
use crate::schema::SchemaManager;

/// PostgreSQL-backed storage for the sync server.
///
/// Every `push` batch and the `wipe` operation run inside a single SQL
/// transaction so the batch either commits entirely or not at all, matching
/// the atomicity the in-memory reference backend gets for free from a
/// single-threaded `DashMap` mutation.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    schema: SchemaManager,
}

impl PostgresStore {
    /// Creates a new `PostgresStore`, opening a connection pool and running
    /// schema bootstrap if `config.run_migrations` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created or schema
    /// bootstrap fails.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config)
            .await
            .map_err(StorageError::from)?;

        if config.run_migrations {
            migrations::run(&pool).await.map_err(StorageError::from)?;
        }

        let schema = SchemaManager::new(pool.clone());
        Ok(Self { pool, schema })
    }

    /// Wraps an existing connection pool. Schema bootstrap is not run
    /// automatically; call [`PostgresStore::ensure_schema`] explicitly.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let schema = SchemaManager::new(pool.clone());
        Self { pool, schema }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        self.schema.ensure_schema().await.map_err(StorageError::from)
    }
}

#[async_trait]
impl SyncStore for PostgresStore {
    #[instrument(skip(self, items), fields(owner, kind = %kind, count = items.len()))]
    async fn push(
        &self,
        owner: &str,
        kind: EntityKind,
        items: Vec<PushItem>,
    ) -> Result<Vec<PushAck>, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        let mut acks = Vec::with_capacity(items.len());
        for item in &items {
            if let Some(parent) = &item.parent
                && item.deleted_at_ms.is_none()
                && !queries::parent_is_live(&mut *tx, owner, parent)
                    .await?
            {
                acks.push(queries::ack_failed(
                    item.uid,
                    format!("parent not found: {}/{}", parent.kind.as_str(), parent.uid),
                ));
                continue;
            }

            let (version, updated_at_ms) = queries::upsert_row(&mut *tx, owner, kind, item).await?;
            acks.push(queries::ack_ok(item.uid, version, updated_at_ms));
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        Ok(acks)
    }

    #[instrument(skip(self), fields(owner, kind = %kind))]
    async fn pull(
        &self,
        owner: &str,
        kind: EntityKind,
        cursor_ms: i64,
        cursor_uid: Uuid,
        limit: u32,
    ) -> Result<PullPage, StorageError> {
        queries::pull_page(&self.pool, owner, kind, cursor_ms, cursor_uid, limit).await
    }

    #[instrument(skip(self, item), fields(owner, kind = %kind, uid = %item.uid))]
    async fn push_one_with_precondition(
        &self,
        owner: &str,
        kind: EntityKind,
        item: PushItem,
        expected_version: Option<i64>,
        explicit_if_match: bool,
    ) -> Result<PushAck, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        let ack = queries::push_one_with_precondition(
            &mut tx,
            owner,
            kind,
            &item,
            expected_version,
            explicit_if_match,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        Ok(ack)
    }

    #[instrument(skip(self), fields(owner, list_uid = %list_uid))]
    async fn delete_task_list_cascading(
        &self,
        owner: &str,
        list_uid: Uuid,
        deleted_at_ms: i64,
    ) -> Result<ListDeletionOutcome, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        let outcome =
            queries::delete_task_list_cascading(&mut tx, owner, list_uid, deleted_at_ms).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        Ok(outcome)
    }

    #[instrument(skip(self), fields(owner, kind = %kind, uid = %uid))]
    async fn get_one(
        &self,
        owner: &str,
        kind: EntityKind,
        uid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<SyncRow>, StorageError> {
        queries::get_one(&self.pool, owner, kind, uid, include_deleted).await
    }
}

#[async_trait]
impl OwnerStore for PostgresStore {
    #[instrument(skip(self), fields(owner))]
    async fn get_or_create(&self, owner: &str) -> Result<OwnerState, StorageError> {
        queries::get_or_create_owner(&self.pool, owner).await
    }

    #[instrument(skip(self), fields(owner))]
    async fn wipe(&self, owner: &str) -> Result<WipeOutcome, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        let outcome = queries::wipe_owner(&mut tx, owner, now_ms()).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::transaction(e.to_string()))?;

        Ok(outcome)
    }
}

//! Schema management for the PostgreSQL storage backend.
//!
//! The server does not use `sqlx::migrate!` codegen (it would pull in the
//! `sqlx-macros`/`sqlx` facade crates this backend otherwise avoids). Schema
//! bootstrap instead runs idempotent `CREATE TABLE IF NOT EXISTS` DDL
//! directly against the pool, driven by [`SchemaManager::ensure_schema`].

use sqlx_core::query::query;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use crate::error::Result;

const CREATE_SYNC_ROWS: &str = r#"
CREATE TABLE IF NOT EXISTS sync_rows (
    owner_id        TEXT    NOT NULL,
    kind            TEXT    NOT NULL,
    uid             UUID    NOT NULL,
    updated_at_ms   BIGINT  NOT NULL,
    deleted_at_ms   BIGINT,
    version         BIGINT  NOT NULL,
    parent_kind     TEXT,
    parent_uid      UUID,
    payload         JSONB   NOT NULL,
    PRIMARY KEY (owner_id, kind, uid)
)
"#;

const CREATE_SYNC_ROWS_PULL_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS sync_rows_pull_idx
    ON sync_rows (owner_id, kind, updated_at_ms, uid)
"#;

const CREATE_SYNC_ROWS_PARENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS sync_rows_parent_idx
    ON sync_rows (owner_id, parent_kind, parent_uid)
    WHERE parent_kind IS NOT NULL
"#;

const CREATE_OWNER_STATE: &str = r#"
CREATE TABLE IF NOT EXISTS owner_state (
    owner_id        TEXT    PRIMARY KEY,
    epoch           BIGINT  NOT NULL,
    last_wipe_at_ms BIGINT,
    last_wipe_by    TEXT
)
"#;

/// Owns the DDL that bootstraps the `sync_rows`/`owner_state` tables.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
}

impl SchemaManager {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `sync_rows` and `owner_state` tables and their indexes
    /// if they do not already exist. Safe to call on every startup.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        query(CREATE_SYNC_ROWS).execute(&self.pool).await?;
        query(CREATE_SYNC_ROWS_PULL_INDEX)
            .execute(&self.pool)
            .await?;
        query(CREATE_SYNC_ROWS_PARENT_INDEX)
            .execute(&self.pool)
            .await?;
        query(CREATE_OWNER_STATE).execute(&self.pool).await?;

        debug!("sync schema ensured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn ddl_mentions_primary_keys() {
        assert!(super::CREATE_SYNC_ROWS.contains("PRIMARY KEY (owner_id, kind, uid)"));
        assert!(super::CREATE_OWNER_STATE.contains("PRIMARY KEY"));
    }
}

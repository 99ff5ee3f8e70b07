//! Database schema bootstrap for the PostgreSQL storage backend.

use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::Result;
use crate::schema::SchemaManager;

/// Ensures the `sync_rows`/`owner_state` schema exists.
///
/// This is not `sqlx::migrate!`-driven versioned migration (that macro
/// pulls in the `sqlx-macros`/`sqlx` facade crates this backend otherwise
/// avoids); it is the same idempotent bootstrap DDL run every startup,
/// via [`SchemaManager::ensure_schema`].
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    info!("ensuring sync schema");
    SchemaManager::new(pool.clone()).ensure_schema().await
}

#[cfg(test)]
mod tests {
    // Schema bootstrap is covered by the testcontainers integration test
    // in tests/schema_test.rs.
}

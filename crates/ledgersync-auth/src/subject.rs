//! Subject resolution: maps an identity provider's `sub` claim to the
//! stable `app_user` UUID used everywhere else in the system.
//!
//! Mirrors [`ledgersync_storage::OwnerStore`]'s shape — a narrow
//! async-trait seam so this crate doesn't hard-wire itself to Postgres.
//! The Postgres implementation lives alongside the rest of the storage
//! layer in `ledgersync-db-postgres`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AuthError;

/// Resolves and upserts the `subject -> app_user` mapping.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Returns the `app_user` id for `subject`, creating a row the first
    /// time this subject is seen.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] for infrastructure failures.
    async fn resolve(&self, subject: &str) -> Result<Uuid, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct InMemorySubjectStore {
        rows: DashMap<String, Uuid>,
    }

    #[async_trait]
    impl SubjectStore for InMemorySubjectStore {
        async fn resolve(&self, subject: &str) -> Result<Uuid, AuthError> {
            if let Some(id) = self.rows.get(subject) {
                return Ok(*id);
            }
            let id = Uuid::new_v4();
            self.rows.insert(subject.to_string(), id);
            Ok(id)
        }
    }

    fn _assert_object_safe(_: &dyn SubjectStore) {}

    #[tokio::test]
    async fn resolve_is_stable_across_calls() {
        let store = InMemorySubjectStore { rows: DashMap::new() };
        let first = store.resolve("auth0|abc").await.unwrap();
        let second = store.resolve("auth0|abc").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn resolve_distinguishes_subjects() {
        let store = InMemorySubjectStore { rows: DashMap::new() };
        let a = store.resolve("auth0|a").await.unwrap();
        let b = store.resolve("auth0|b").await.unwrap();
        assert_ne!(a, b);
    }
}

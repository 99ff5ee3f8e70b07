//! Default in-memory implementations of [`SubjectStore`] and
//! [`DirectoryService`], the two small identity-provider-facing traits
//! `ledgersync-auth` leaves to its caller.
//!
//! Production deployments with a real `app_user` table or a WorkOS-style
//! directory should supply their own implementations; these exist so the
//! server can run standalone (dev mode, tests) without one.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use ledgersync_auth::{AuthError, DirectoryService, Membership, SubjectStore};

/// Maps `sub` claims to stable `app_user` ids, assigning a fresh
/// [`Uuid::new_v4`] the first time a subject is seen.
#[derive(Default)]
pub struct InMemorySubjectStore {
    rows: DashMap<String, Uuid>,
}

impl InMemorySubjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubjectStore for InMemorySubjectStore {
    async fn resolve(&self, subject: &str) -> Result<Uuid, AuthError> {
        Ok(*self
            .rows
            .entry(subject.to_string())
            .or_insert_with(Uuid::new_v4))
    }
}

/// A directory with no memberships configured for anyone; every subject
/// falls through to the configured default tenant. Useful for
/// single-tenant deployments and tests.
#[derive(Default)]
pub struct EmptyDirectoryService;

#[async_trait]
impl DirectoryService for EmptyDirectoryService {
    async fn list_memberships(&self, _subject: &str) -> Result<Vec<Membership>, AuthError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_is_stable_across_calls() {
        let store = InMemorySubjectStore::new();
        let first = store.resolve("auth0|a").await.unwrap();
        let second = store.resolve("auth0|a").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_directory_has_no_memberships() {
        let directory = EmptyDirectoryService;
        assert!(directory.list_memberships("auth0|a").await.unwrap().is_empty());
    }
}

//! The session store (component C5): a thread-safe, per-process
//! `sessionId -> Session` map.
//!
//! This is deliberately *not* shared across nodes — a client that
//! reconnects to a different node must `beginSession` again.
//! The session-user binding check the pipeline performs on every request
//! is what makes this safe even if a stale session id is replayed against
//! the wrong node.

use dashmap::DashMap;
use uuid::Uuid;

use ledgersync_core::now_ms;

/// One active sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    /// The owner epoch observed at `beginSession` time. The epoch gate
    /// compares each request's declared epoch against the *current* owner
    /// epoch, not this snapshot; it's retained for diagnostics.
    pub epoch: i64,
}

/// In-memory session store, keyed by session id.
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
    ttl_ms: i64,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl_ms: ttl_seconds as i64 * 1000,
        }
    }

    /// Creates a new session for `user_id`, opportunistically sweeping
    /// expired entries first.
    pub fn create(&self, user_id: Uuid, current_epoch: i64) -> Session {
        self.sweep_expired();
        let now = now_ms();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            created_at_ms: now,
            expires_at_ms: now + self.ttl_ms,
            epoch: current_epoch,
        };
        self.sessions.insert(session.id, session.clone());
        session
    }

    /// Returns the session, or `None` if it doesn't exist or has expired.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Session> {
        let entry = self.sessions.get(&id)?;
        if entry.expires_at_ms <= now_ms() {
            drop(entry);
            self.sessions.remove(&id);
            return None;
        }
        Some(entry.clone())
    }

    pub fn delete(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Deletes every session belonging to `user_id` (invoked after a wipe
    /// commits), returning the count removed.
    pub fn delete_by_user(&self, user_id: Uuid) -> usize {
        let to_remove: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| *entry.key())
            .collect();
        for id in &to_remove {
            self.sessions.remove(id);
        }
        to_remove.len()
    }

    /// Periodic sweeper entry point ("Session sweeper runs every
    /// 5 min"). Also called opportunistically from [`Self::create`].
    pub fn sweep_expired(&self) {
        let now = now_ms();
        self.sessions.retain(|_, session| session.expires_at_ms > now);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_returns_same_session() {
        let store = SessionStore::new(1800);
        let user = Uuid::new_v4();
        let session = store.create(user, 1);
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched, session);
    }

    #[test]
    fn get_missing_returns_none() {
        let store = SessionStore::new(1800);
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn expired_session_is_absent() {
        let store = SessionStore::new(0);
        let user = Uuid::new_v4();
        let session = store.create(user, 1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.get(session.id).is_none());
    }

    #[test]
    fn delete_by_user_invalidates_all_their_sessions() {
        let store = SessionStore::new(1800);
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let a1 = store.create(user_a, 1);
        let a2 = store.create(user_a, 1);
        let b1 = store.create(user_b, 1);

        let removed = store.delete_by_user(user_a);
        assert_eq!(removed, 2);
        assert!(store.get(a1.id).is_none());
        assert!(store.get(a2.id).is_none());
        assert!(store.get(b1.id).is_some());
    }

    #[test]
    fn delete_removes_single_session() {
        let store = SessionStore::new(1800);
        let session = store.create(Uuid::new_v4(), 1);
        store.delete(session.id);
        assert!(store.get(session.id).is_none());
    }

    #[test]
    fn sweep_expired_drops_only_expired_entries() {
        let store = SessionStore::new(0);
        let live_store = SessionStore::new(1800);
        let expired = store.create(Uuid::new_v4(), 1);
        let live = live_store.create(Uuid::new_v4(), 1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.sweep_expired();
        assert!(store.is_empty());
        assert!(live_store.get(live.id).is_some());
        let _ = expired;
    }
}

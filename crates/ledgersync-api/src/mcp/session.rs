//! The MCP session map. Distinct from the sync session store (C5):
//! `initialize` mints one of these and returns its id in the
//! `Mcp-Session-Id` header; every other MCP method requires that header
//! and rejects on user mismatch.

use dashmap::DashMap;
use uuid::Uuid;

use ledgersync_core::now_ms;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub protocol_version: String,
    pub created_at_ms: i64,
}

#[derive(Default)]
pub struct McpSessionStore {
    sessions: DashMap<Uuid, McpSession>,
}

impl McpSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, user_id: Uuid, protocol_version: impl Into<String>) -> McpSession {
        let session = McpSession {
            id: Uuid::new_v4(),
            user_id,
            protocol_version: protocol_version.into(),
            created_at_ms: now_ms(),
        };
        self.sessions.insert(session.id, session.clone());
        session
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<McpSession> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    pub fn delete(&self, id: Uuid) {
        self.sessions.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips() {
        let store = McpSessionStore::new();
        let user = Uuid::new_v4();
        let session = store.create(user, "2025-03-26");
        assert_eq!(store.get(session.id), Some(session));
    }

    #[test]
    fn delete_removes_session() {
        let store = McpSessionStore::new();
        let session = store.create(Uuid::new_v4(), "2024-11-05");
        store.delete(session.id);
        assert!(store.get(session.id).is_none());
    }
}

//! Context attachments (component C13): a session-scoped, in-memory list
//! of `(uid, kind, title?)` references an MCP client has attached for
//! context, capped at 50 entries per session. Not persisted — lost on
//! session expiry.

use dashmap::DashMap;
use uuid::Uuid;

use ledgersync_core::EntityKind;

pub const MAX_ATTACHMENTS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment cap of {MAX_ATTACHMENTS} reached")]
    CapReached,
}

/// Attachments for every MCP session, keyed by session id.
///
/// Two attachments sharing a `uid` under different kinds are distinct
/// entries — `(uid, kind)` is the key; `title` is carried metadata, not
/// part of it.
#[derive(Default)]
pub struct AttachmentStore {
    sessions: DashMap<Uuid, Vec<(Uuid, EntityKind, Option<String>)>>,
}

impl AttachmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `(uid, kind, title)` if not already attached. A duplicate
    /// attach updates the stored `title` in place rather than erroring.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::CapReached`] if the session already has
    /// 50 distinct attachments.
    pub fn attach(
        &self,
        session_id: Uuid,
        uid: Uuid,
        kind: EntityKind,
        title: Option<String>,
    ) -> Result<(), AttachmentError> {
        let mut entry = self.sessions.entry(session_id).or_default();
        if let Some(existing) = entry.iter_mut().find(|(u, k, _)| *u == uid && *k == kind) {
            existing.2 = title;
            return Ok(());
        }
        if entry.len() >= MAX_ATTACHMENTS {
            return Err(AttachmentError::CapReached);
        }
        entry.push((uid, kind, title));
        Ok(())
    }

    /// Removes `(uid, kind)` if present. Removing an absent pair is a
    /// no-op.
    pub fn detach(&self, session_id: Uuid, uid: Uuid, kind: EntityKind) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.retain(|(u, k, _)| !(*u == uid && *k == kind));
        }
    }

    /// Returns a defensive copy of the session's attachments.
    #[must_use]
    pub fn list(&self, session_id: Uuid) -> Vec<(Uuid, EntityKind, Option<String>)> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self, session_id: Uuid) {
        self.sessions.remove(&session_id);
    }
}

//! The closed set of syncable entity kinds and their parent relationships.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A syncable entity kind. The wire representation is the lowercase,
/// snake_case name used in REST paths (`/v1/<kind>`) and push/pull bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Note,
    Task,
    Comment,
    Chat,
    ChatMessage,
    TaskList,
    TaskListCategory,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Note,
        EntityKind::Task,
        EntityKind::Comment,
        EntityKind::Chat,
        EntityKind::ChatMessage,
        EntityKind::TaskList,
        EntityKind::TaskListCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Note => "note",
            EntityKind::Task => "task",
            EntityKind::Comment => "comment",
            EntityKind::Chat => "chat",
            EntityKind::ChatMessage => "chat_message",
            EntityKind::TaskList => "task_list",
            EntityKind::TaskListCategory => "task_list_category",
        }
    }

    /// Whether this kind can carry a parent reference, and if so, which
    /// kind(s) are valid parents. `Comment` is the only kind whose parent
    /// kind varies per-row (note or task); the rest are fixed.
    pub fn has_parent(&self) -> bool {
        matches!(
            self,
            EntityKind::Comment | EntityKind::ChatMessage | EntityKind::Task | EntityKind::TaskListCategory
        )
    }

    /// Whether a parent reference is mandatory on create/update for this
    /// kind. `Comment` and `ChatMessage` have nowhere else to hang; `Task`
    /// and `TaskListCategory` may carry an optional `taskListUid`.
    pub fn requires_parent(&self) -> bool {
        matches!(self, EntityKind::Comment | EntityKind::ChatMessage)
    }

    /// The fixed parent kind, or `None` when the parent kind is
    /// per-row (comment) or the kind has no parent at all.
    pub fn fixed_parent_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::ChatMessage => Some(EntityKind::Chat),
            EntityKind::Task => Some(EntityKind::TaskList),
            EntityKind::TaskListCategory => Some(EntityKind::TaskList),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" | "notes" => Ok(EntityKind::Note),
            "task" | "tasks" => Ok(EntityKind::Task),
            "comment" | "comments" => Ok(EntityKind::Comment),
            "chat" | "chats" => Ok(EntityKind::Chat),
            "chat_message" | "chat_messages" => Ok(EntityKind::ChatMessage),
            "task_list" | "task_lists" => Ok(EntityKind::TaskList),
            "task_list_category" | "task_list_categories" => Ok(EntityKind::TaskListCategory),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plural_paths() {
        assert_eq!(EntityKind::from_str("notes").unwrap(), EntityKind::Note);
        assert_eq!(
            EntityKind::from_str("chat_messages").unwrap(),
            EntityKind::ChatMessage
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(EntityKind::from_str("widgets").is_err());
    }

    #[test]
    fn comment_has_per_row_parent() {
        assert!(EntityKind::Comment.has_parent());
        assert_eq!(EntityKind::Comment.fixed_parent_kind(), None);
    }

    #[test]
    fn chat_message_has_fixed_parent() {
        assert_eq!(
            EntityKind::ChatMessage.fixed_parent_kind(),
            Some(EntityKind::Chat)
        );
    }

    #[test]
    fn note_has_no_parent() {
        assert!(!EntityKind::Note.has_parent());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EntityKind::ChatMessage).unwrap();
        assert_eq!(json, "\"chat_message\"");
    }
}

use thiserror::Error;

/// Low-level errors shared by every ledgersync crate: malformed
/// identifiers, timestamps, and cursors.
///
/// Storage- and transport-level errors live closer to where they're
/// raised (`ledgersync-storage::StorageError`, `ledgersync-auth::AuthError`,
/// `ledgersync-api::SyncError`) and convert into their own representations
/// rather than this one growing to cover every concern.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid uid: {0}")]
    InvalidUid(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("malformed cursor")]
    InvalidCursor,

    #[error("unknown entity kind: {0}")]
    UnknownKind(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_uid_message() {
        let err = CoreError::InvalidUid("not-a-uuid".into());
        assert_eq!(err.to_string(), "invalid uid: not-a-uuid");
    }

    #[test]
    fn unknown_kind_message() {
        let err = CoreError::UnknownKind("widget".into());
        assert_eq!(err.to_string(), "unknown entity kind: widget");
    }
}

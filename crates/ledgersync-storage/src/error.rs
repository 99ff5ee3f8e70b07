//! Storage error types for the sync storage abstraction layer.

use std::fmt;

/// Errors that can occur during storage operations.
///
/// Push-item-level validation failures (bad payload, missing parent) are
/// reported per-item through [`crate::types::PushAck`], not through this
/// type. `StorageError` covers failures that abort the whole request:
/// a row genuinely missing for a single-item read, an `If-Match`
/// precondition mismatch, connection loss, or a failed commit.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row does not exist for this owner/kind/uid.
    #[error("not found: {kind}/{uid}")]
    NotFound { kind: String, uid: String },

    /// An implicit (non-`If-Match`) optimistic-concurrency baseline did
    /// not match the stored version.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i64, actual: i64 },

    /// A client-supplied `If-Match` header did not match the stored
    /// version.
    #[error("precondition failed: expected {expected}, found {actual}")]
    PreconditionFailed { expected: i64, actual: i64 },

    /// The referenced parent entity does not exist for this owner.
    #[error("parent not found: {parent_kind}/{parent_uid}")]
    ParentNotFound {
        parent_kind: String,
        parent_uid: String,
    },

    /// A `(owner, kind, uid)` uniqueness violation was observed. The LWW
    /// upsert contract should make this impossible; surfacing it as an
    /// error rather than swallowing it is intentional.
    #[error("unique constraint violation for owner={owner} kind={kind} uid={uid}")]
    UniqueViolation {
        owner: String,
        kind: String,
        uid: String,
    },

    /// The transaction could not be committed or rolled back.
    #[error("transaction error: {message}")]
    Transaction { message: String },

    /// Failed to connect to, or lost the connection to, the backing store.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Any other backend-internal failure.
    #[error("internal storage error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(kind: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            uid: uid.into(),
        }
    }

    #[must_use]
    pub fn version_conflict(expected: i64, actual: i64) -> Self {
        Self::VersionConflict { expected, actual }
    }

    #[must_use]
    pub fn precondition_failed(expected: i64, actual: i64) -> Self {
        Self::PreconditionFailed { expected, actual }
    }

    #[must_use]
    pub fn parent_not_found(parent_kind: impl Into<String>, parent_uid: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_kind: parent_kind.into(),
            parent_uid: parent_uid.into(),
        }
    }

    #[must_use]
    pub fn unique_violation(
        owner: impl Into<String>,
        kind: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self::UniqueViolation {
            owner: owner.into(),
            kind: kind.into(),
            uid: uid.into(),
        }
    }

    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    #[must_use]
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    #[must_use]
    pub fn is_parent_not_found(&self) -> bool {
        matches!(self, Self::ParentNotFound { .. })
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::PreconditionFailed { .. } => ErrorCategory::Conflict,
            Self::ParentNotFound { .. } => ErrorCategory::Validation,
            Self::UniqueViolation { .. } => ErrorCategory::Bug,
            Self::Transaction { .. } => ErrorCategory::Transaction,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Transaction,
    Infrastructure,
    /// A condition the upsert contract should have made impossible.
    Bug,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Bug => write!(f, "bug"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message() {
        let err = StorageError::not_found("note", "abc");
        assert_eq!(err.to_string(), "not found: note/abc");
        assert!(err.is_not_found());
    }

    #[test]
    fn version_conflict_message() {
        let err = StorageError::version_conflict(3, 5);
        assert_eq!(err.to_string(), "version conflict: expected 3, found 5");
        assert!(err.is_version_conflict());
    }

    #[test]
    fn precondition_failed_message() {
        let err = StorageError::precondition_failed(3, 5);
        assert_eq!(err.to_string(), "precondition failed: expected 3, found 5");
        assert!(err.is_precondition_failed());
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn parent_not_found_category() {
        let err = StorageError::parent_not_found("task_list", "x");
        assert!(err.is_parent_not_found());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn unique_violation_category() {
        let err = StorageError::unique_violation("u1", "note", "x");
        assert!(err.to_string().contains("owner=u1"));
        assert_eq!(err.category(), ErrorCategory::Bug);
    }
}

//! The request-facing error taxonomy, and its conversions from
//! the narrower errors raised by `ledgersync-auth` and `ledgersync-storage`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use ledgersync_auth::AuthError;
use ledgersync_storage::StorageError;

/// The taxonomy every handler in this crate ultimately returns.
///
/// Push handlers are the exception: per-item failures are aggregated into
/// [`ledgersync_storage::PushAck::error`] and never reach this type — the
/// HTTP response for a push is 200 unless the whole batch transaction
/// fails.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gone: {0}")]
    Gone(String),

    /// `kind` distinguishes the three 4xx preconditions (epoch mismatch,
    /// missing session, `If-Match` mismatch) without reusing the same
    /// status for all of them.
    #[error("precondition failed: {message}")]
    Precondition {
        kind: PreconditionKind,
        message: String,
        /// Carried on epoch mismatches so the client can resync without a
        /// round trip.
        server_epoch: Option<i64>,
    },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    /// Surfaced only where a parent-reference failure escapes the push-ack
    /// aggregation path (e.g. a single-item PUT/PATCH with a dangling
    /// parent).
    #[error("parent not found: {0}")]
    Parent(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Distinguishes the three precondition statuses: 409 (epoch mismatch or
/// version mismatch without `If-Match`), 412 (`If-Match` mismatch), and
/// 428 (missing session header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionKind {
    EpochMismatch,
    VersionMismatch,
    IfMatchMismatch,
    SessionRequired,
}

impl SyncError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub fn gone(message: impl Into<String>) -> Self {
        Self::Gone(message.into())
    }

    #[must_use]
    pub fn epoch_mismatch(server_epoch: i64) -> Self {
        Self::Precondition {
            kind: PreconditionKind::EpochMismatch,
            message: format!("epoch mismatch, server epoch is {server_epoch}"),
            server_epoch: Some(server_epoch),
        }
    }

    #[must_use]
    pub fn version_mismatch(expected: i64, actual: i64) -> Self {
        Self::Precondition {
            kind: PreconditionKind::VersionMismatch,
            message: format!("version mismatch: expected {expected}, found {actual}"),
            server_epoch: None,
        }
    }

    #[must_use]
    pub fn if_match_mismatch(expected: i64, actual: i64) -> Self {
        Self::Precondition {
            kind: PreconditionKind::IfMatchMismatch,
            message: format!("If-Match mismatch: expected {expected}, found {actual}"),
            server_epoch: None,
        }
    }

    #[must_use]
    pub fn session_required() -> Self {
        Self::Precondition {
            kind: PreconditionKind::SessionRequired,
            message: "X-Sync-Session header is required for this operation".to_string(),
            server_epoch: None,
        }
    }

    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::RateLimit {
            retry_after_secs: retry_after_secs.max(1),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::Precondition { kind, .. } => match kind {
                PreconditionKind::EpochMismatch | PreconditionKind::VersionMismatch => {
                    StatusCode::CONFLICT
                }
                PreconditionKind::IfMatchMismatch => StatusCode::PRECONDITION_FAILED,
                PreconditionKind::SessionRequired => StatusCode::PRECONDITION_REQUIRED,
            },
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Parent(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The `{error, correlation_id, epoch?}` body shape every error response
/// shares.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    epoch: Option<i64>,
}

/// Wraps a [`SyncError`] with the correlation id of the request that
/// produced it, so [`IntoResponse`] can echo it on every error response.
/// Handlers should return `Result<_, WithCorrelation>` via
/// [`SyncError::with_correlation`] rather than a bare `SyncError` whenever
/// a correlation id is in scope.
pub struct WithCorrelation {
    pub error: SyncError,
    pub correlation_id: Uuid,
}

impl SyncError {
    #[must_use]
    pub fn with_correlation(self, correlation_id: Uuid) -> WithCorrelation {
        WithCorrelation {
            error: self,
            correlation_id,
        }
    }
}

impl IntoResponse for WithCorrelation {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let epoch = match &self.error {
            SyncError::Precondition { server_epoch, .. } => *server_epoch,
            _ => None,
        };
        let body = ErrorBody {
            error: self.error.to_string(),
            correlation_id: self.correlation_id.to_string(),
            epoch,
        };
        let mut response = (status, Json(body)).into_response();
        if let SyncError::RateLimit { retry_after_secs } = &self.error {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        if let Some(epoch) = epoch {
            if let Ok(value) = epoch.to_string().parse() {
                response.headers_mut().insert("X-Sync-Epoch", value);
            }
        }
        response
    }
}

/// Bare [`SyncError`] responses fall back to a nil correlation id; every
/// path that can produce one should prefer [`SyncError::with_correlation`]
/// instead.
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        self.with_correlation(Uuid::nil()).into_response()
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, uid } => Self::NotFound(format!("{kind}/{uid}")),
            StorageError::VersionConflict { expected, actual } => {
                Self::version_mismatch(expected, actual)
            }
            StorageError::PreconditionFailed { expected, actual } => {
                Self::if_match_mismatch(expected, actual)
            }
            StorageError::ParentNotFound {
                parent_kind,
                parent_uid,
            } => Self::Parent(format!("{parent_kind}/{parent_uid} not found")),
            StorageError::UniqueViolation { .. }
            | StorageError::Transaction { .. }
            | StorageError::Connection { .. }
            | StorageError::Internal { .. } => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_mismatch_is_conflict_and_carries_epoch() {
        let err = SyncError::epoch_mismatch(3);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(matches!(
            err,
            SyncError::Precondition {
                server_epoch: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn if_match_mismatch_is_412() {
        let err = SyncError::if_match_mismatch(1, 2);
        assert_eq!(err.status_code(), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn session_required_is_428() {
        assert_eq!(
            SyncError::session_required().status_code(),
            StatusCode::PRECONDITION_REQUIRED
        );
    }

    #[test]
    fn storage_not_found_maps_to_404() {
        let err: SyncError = StorageError::not_found("note", "x").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_version_conflict_maps_to_409() {
        let err: SyncError = StorageError::version_conflict(1, 2).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_error_maps_to_401() {
        let err: SyncError = AuthError::unauthorized("no token").into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}

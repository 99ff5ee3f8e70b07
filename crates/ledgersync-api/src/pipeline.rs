//! The request pipeline (component C8): correlation, auth, session,
//! epoch, and rate-limit stages, applied in order ahead of every sync
//! handler.
//!
//! Recovery (stage 2, panic catch-and-log) is a router-level concern
//! handled by `tower_http::catch_panic::CatchPanicLayer` in
//! [`crate::routes`], not by this module.

use std::sync::{Arc, Mutex};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::error::{SyncError, WithCorrelation};
use crate::rate_limit::Admission;
use crate::session::Session;
use crate::state::AppState;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const SESSION_HEADER: &str = "x-sync-session";
pub const EPOCH_HEADER: &str = "x-sync-epoch";

/// Resolves the correlation id ahead of `TraceLayer` and stamps it onto
/// the request extensions, so the per-request `http.request` span built in
/// `crate::routes` can record it even for requests that fail before
/// reaching a handler extractor.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    request.extensions_mut().insert(id);
    next.run(request).await
}

/// Reads or generates the correlation id for this request (pipeline
/// stage 1). Cheap enough to extract on every handler, including exempt
/// ones, since every error response needs one.
pub struct CorrelationId(pub Uuid);

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        Ok(CorrelationId(id))
    }
}

/// Shared handle the [`PipelineContext`] extractor (reached deep inside
/// `next.run`) deposits its computed [`Admission`] into, so
/// [`rate_limit_headers_middleware`] can read it back out after the
/// response is built and stamp the `X-RateLimit-*` headers. Extraction
/// and response assembly happen on opposite sides of `next.run`, so a
/// return value can't cross that boundary directly.
pub type AdmissionSlot = Arc<Mutex<Option<Admission>>>;

/// Wraps the whole router: inserts an empty [`AdmissionSlot`] into the
/// request before calling through to the handler, then (if the request
/// reached [`PipelineContext`] extraction) stamps
/// `X-RateLimit-{Limit,Burst,Remaining,Reset}` on the response — success
/// or error alike, since a denied request still needs the headers that
/// tell the client when to retry.
pub async fn rate_limit_headers_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let slot: AdmissionSlot = Arc::new(Mutex::new(None));
    request.extensions_mut().insert(slot.clone());

    let mut response = next.run(request).await;

    let admission = slot
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take();
    if let Some(admission) = admission {
        let config = state.rate_limiter.config();
        let headers = response.headers_mut();
        if let Ok(v) = config.max_requests.to_string().parse() {
            headers.insert("X-RateLimit-Limit", v);
        }
        if let Ok(v) = config.burst.to_string().parse() {
            headers.insert("X-RateLimit-Burst", v);
        }
        if let Ok(v) = admission.remaining.to_string().parse() {
            headers.insert("X-RateLimit-Remaining", v);
        }
        if let Ok(v) = admission.reset_at_secs.to_string().parse() {
            headers.insert("X-RateLimit-Reset", v);
        }
    }
    response
}

/// The result of pipeline stages 1, 3, and 6 (correlation, auth, rate
/// limit): every authenticated, rate-limited request's identity. Used
/// directly by exempt handlers (`sync/info`, begin-session, end-session);
/// [`SyncContext`] extends it with the session (4) and epoch (5) stages
/// for everything else.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub correlation_id: Uuid,
    pub subject: String,
    pub user_id: Uuid,
    pub dev_mode_bypass: bool,
}

impl FromRequestParts<AppState> for PipelineContext {
    type Rejection = WithCorrelation;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CorrelationId(correlation_id) = CorrelationId::from_request_parts(parts, state)
            .await
            .expect("infallible");

        let bearer = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let debug_sub = parts
            .headers
            .get(ledgersync_auth::dev_mode::DEBUG_SUB_HEADER)
            .and_then(|v| v.to_str().ok());

        let auth_ctx = state
            .auth_gate
            .authenticate(bearer, debug_sub)
            .await
            .map_err(|e| SyncError::from(e).with_correlation(correlation_id))?;

        let admission = state.rate_limiter.admit(auth_ctx.user_id);
        if let Some(slot) = parts.extensions.get::<AdmissionSlot>() {
            *slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(admission);
        }
        if !admission.allowed {
            let retry_after = admission.retry_after_secs.unwrap_or(1);
            return Err(SyncError::rate_limited(retry_after).with_correlation(correlation_id));
        }

        tracing::Span::current().record("owner_id", tracing::field::display(auth_ctx.user_id));

        Ok(PipelineContext {
            correlation_id,
            subject: auth_ctx.subject,
            user_id: auth_ctx.user_id,
            dev_mode_bypass: auth_ctx.dev_mode_bypass,
        })
    }
}

/// The full pipeline for non-exempt operations: [`PipelineContext`] plus
/// the session (stage 4) and epoch (stage 5) checks.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub pipeline: PipelineContext,
    pub session: Session,
    pub epoch: i64,
}

impl FromRequestParts<AppState> for SyncContext {
    type Rejection = WithCorrelation;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let pipeline = PipelineContext::from_request_parts(parts, state).await?;

        let session_id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| SyncError::session_required().with_correlation(pipeline.correlation_id))?;

        let session = state.sessions.get(session_id).ok_or_else(|| {
            SyncError::session_required().with_correlation(pipeline.correlation_id)
        })?;

        if session.user_id != pipeline.user_id {
            return Err(
                SyncError::forbidden("session belongs to a different user")
                    .with_correlation(pipeline.correlation_id),
            );
        }

        let declared_epoch: i64 = parts
            .headers
            .get(EPOCH_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                SyncError::validation("X-Sync-Epoch header is required")
                    .with_correlation(pipeline.correlation_id)
            })?;

        let owner = state
            .owner_store
            .get_or_create(&pipeline.user_id.to_string())
            .await
            .map_err(|e| SyncError::from(e).with_correlation(pipeline.correlation_id))?;

        if declared_epoch != owner.epoch {
            return Err(SyncError::epoch_mismatch(owner.epoch).with_correlation(pipeline.correlation_id));
        }

        Ok(SyncContext {
            pipeline,
            session,
            epoch: owner.epoch,
        })
    }
}

//! Auth-adjacent handlers that sit outside the sync pipeline proper:
//! `POST /v1/auth/token/exchange` (C12) and `GET /v1/auth/tenant` (C11).

use axum::Json;
use axum::extract::State;

use ledgersync_auth::token_exchange::{self, TokenExchangeRequest, TokenExchangeResponse};
use ledgersync_auth::tenant::{self, TenantResolution};
use ledgersync_core::now_ms;

use crate::error::{SyncError, WithCorrelation};
use crate::pipeline::PipelineContext;
use crate::state::AppState;

/// `POST /v1/auth/token/exchange`.
pub async fn token_exchange(
    State(state): State<AppState>,
    ctx: PipelineContext,
    Json(body): Json<TokenExchangeRequest>,
) -> Result<Json<TokenExchangeResponse>, WithCorrelation> {
    let now_secs = now_ms() / 1000;
    let response = token_exchange::exchange(&state.hs256, &ctx.subject, &body, now_secs)
        .map_err(|e| SyncError::from(e).with_correlation(ctx.correlation_id))?;
    Ok(Json(response))
}

/// `GET /v1/auth/tenant`.
pub async fn tenant(
    State(state): State<AppState>,
    ctx: PipelineContext,
) -> Result<Json<TenantResolution>, WithCorrelation> {
    let default_tenant_id = state.config.auth.default_tenant_id.as_deref();
    let resolution = tenant::resolve_tenant(state.directory.as_ref(), &ctx.subject, default_tenant_id)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(ctx.correlation_id))?;
    Ok(Json(resolution))
}

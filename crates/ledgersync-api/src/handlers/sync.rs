//! Sync state management handlers: `GET /v1/sync/info`,
//! `POST /v1/sync/sessions`, `DELETE /v1/sync/sessions/{id}`,
//! `GET /v1/sync/state`, `POST /v1/account/wipe`.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use ledgersync_core::EntityKind;

use crate::error::{SyncError, WithCorrelation};
use crate::pipeline::PipelineContext;
use crate::state::AppState;

/// Builds the stable `sync-info` capability document.
pub(crate) fn sync_info_body(state: &AppState) -> Value {
    let rl = state.rate_limiter.config();
    let entities: serde_json::Map<String, Value> = EntityKind::ALL
        .iter()
        .map(|kind| {
            (
                kind.as_str().to_string(),
                json!({ "maxLimit": 1000, "push": true, "pull": true }),
            )
        })
        .collect();

    json!({
        "apiVersion": "1.1",
        "serverTime": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        "entities": entities,
        "locking": { "supported": true, "mode": "session" },
        "minClientVersion": "0.1.0",
        "rateLimit": {
            "windowSeconds": rl.window_seconds,
            "maxRequests": rl.max_requests,
            "burst": rl.burst,
        },
        "hints": { "recommendedBatch": 500, "backoffMsOn429": 1500 },
    })
}

/// `GET /v1/sync/info`: session- and epoch-exempt, but still authenticated
/// and rate-limited like every other pipeline entry.
pub async fn sync_info(State(state): State<AppState>, _ctx: PipelineContext) -> Json<Value> {
    Json(sync_info_body(&state))
}

#[derive(Serialize)]
pub struct BeginSessionResponse {
    id: Uuid,
    epoch: i64,
}

/// `POST /v1/sync/sessions`: epoch- and session-exempt.
pub async fn begin_session(
    State(state): State<AppState>,
    ctx: PipelineContext,
) -> Result<Json<BeginSessionResponse>, WithCorrelation> {
    let owner_state = state
        .owner_store
        .get_or_create(&ctx.user_id.to_string())
        .await
        .map_err(|e| SyncError::from(e).with_correlation(ctx.correlation_id))?;
    let session = state.sessions.create(ctx.user_id, owner_state.epoch);
    Ok(Json(BeginSessionResponse {
        id: session.id,
        epoch: owner_state.epoch,
    }))
}

/// `DELETE /v1/sync/sessions/{id}`: session- and epoch-exempt.
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _ctx: PipelineContext,
) -> axum::http::StatusCode {
    state.sessions.delete(id);
    axum::http::StatusCode::NO_CONTENT
}

#[derive(Serialize)]
pub struct SyncStateResponse {
    epoch: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_wipe_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_wipe_by: Option<String>,
}

pub async fn sync_state(
    State(state): State<AppState>,
    ctx: PipelineContext,
) -> Result<Json<SyncStateResponse>, WithCorrelation> {
    let owner = state
        .owner_store
        .get_or_create(&ctx.user_id.to_string())
        .await
        .map_err(|e| SyncError::from(e).with_correlation(ctx.correlation_id))?;
    Ok(Json(SyncStateResponse {
        epoch: owner.epoch,
        last_wipe_at: owner.last_wipe_at_ms,
        last_wipe_by: owner.last_wipe_by,
    }))
}

#[derive(serde::Deserialize)]
pub struct WipeRequest {
    confirm: String,
}

#[derive(Serialize)]
pub struct WipeResponse {
    new_epoch: i64,
    deleted_counts_by_kind: std::collections::HashMap<String, u64>,
}

/// `POST /v1/account/wipe`.
pub async fn wipe(
    State(state): State<AppState>,
    ctx: PipelineContext,
    Json(body): Json<WipeRequest>,
) -> Result<Json<WipeResponse>, WithCorrelation> {
    if body.confirm != "WIPE" {
        return Err(SyncError::validation("confirm must be the literal string \"WIPE\"")
            .with_correlation(ctx.correlation_id));
    }

    let outcome = state
        .owner_store
        .wipe(&ctx.user_id.to_string())
        .await
        .map_err(|e| SyncError::from(e).with_correlation(ctx.correlation_id))?;

    state.sessions.delete_by_user(ctx.user_id);

    let deleted_counts_by_kind = outcome
        .deleted_counts_by_kind
        .into_iter()
        .map(|(kind, count)| (kind.as_str().to_string(), count))
        .collect();

    Ok(Json(WipeResponse {
        new_epoch: outcome.new_epoch,
        deleted_counts_by_kind,
    }))
}

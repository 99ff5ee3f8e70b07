//! Generic REST CRUD surface (component C9), parameterized over
//! [`EntityKind`] via a path segment: list/create/get/replace/merge/
//! soft-delete/archive/process, plus the per-kind sync push/pull
//! endpoints.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use ledgersync_core::{Cursor, EntityKind, now_ms};
use ledgersync_storage::PushItem;

use crate::error::{SyncError, WithCorrelation};
use crate::payload;
use crate::pipeline::SyncContext;
use crate::state::AppState;

fn parse_kind(raw: &str) -> Result<EntityKind, SyncError> {
    EntityKind::from_str(raw).map_err(|_| SyncError::validation(format!("unknown kind: {raw}")))
}

/// `If-Match` carries the client's last-known version.
fn if_match_version(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(axum::http::header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim_matches('"').parse().ok())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default, rename = "includeDeleted")]
    pub include_deleted: bool,
}

/// `GET /v1/<kind>`: cursor-paginated list.
pub async fn list(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path(kind_raw): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;
    let decoded = Cursor::decode(query.cursor.as_deref());
    let limit = query.limit.unwrap_or(500).clamp(1, 1000);

    let page = state
        .sync_store
        .pull(&ctx.pipeline.user_id.to_string(), kind, decoded.ms, decoded.uid, limit)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    let mut items: Vec<Value> = page.upserts.iter().map(|r| r.payload.clone()).collect();
    if query.include_deleted {
        items.extend(page.deletes.iter().map(|d| {
            json!({ "uid": d.uid, "sync": { "isDeleted": true, "deletedAtMs": d.deleted_at_ms } })
        }));
    }

    Ok(Json(json!({ "items": items, "nextCursor": page.next_cursor })))
}

/// `POST /v1/<kind>`: create. The server generates `uid` if absent.
pub async fn create(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path(kind_raw): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;

    if body.get("uid").and_then(Value::as_str).is_none() {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("uid".to_string(), json!(Uuid::new_v4().to_string()));
        }
    }
    if body.get("updatedTs").and_then(Value::as_str).is_none() {
        if let Some(obj) = body.as_object_mut() {
            let now = time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(now_ms()) * 1_000_000)
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
            obj.insert(
                "updatedTs".to_string(),
                json!(now.format(&time::format_description::well_known::Rfc3339).unwrap_or_default()),
            );
        }
    }

    let item = payload::extract(kind, &body).map_err(|e| e.with_correlation(cid))?;
    let ack = state
        .sync_store
        .push_one_with_precondition(&ctx.pipeline.user_id.to_string(), kind, item, None, false)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    if !ack.is_ok() {
        return Err(SyncError::validation(ack.error.unwrap_or_default()).with_correlation(cid));
    }

    Ok((StatusCode::CREATED, Json(body)))
}

/// `GET /v1/<kind>/{uid}`: 404 missing, 410 tombstone (unless
/// `includeDeleted`).
pub async fn get_one(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path((kind_raw, uid)): Path<(String, Uuid)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;

    let row = state
        .sync_store
        .get_one(&ctx.pipeline.user_id.to_string(), kind, uid, query.include_deleted)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?
        .ok_or_else(|| SyncError::not_found(format!("{kind}/{uid}")).with_correlation(cid))?;

    if row.is_tombstone() && !query.include_deleted {
        return Err(SyncError::gone(format!("{kind}/{uid}")).with_correlation(cid));
    }

    Ok(Json(row.payload))
}

/// `PUT /v1/<kind>/{uid}`: full replace, honoring `If-Match`.
pub async fn replace(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path((kind_raw, uid)): Path<(String, Uuid)>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("uid".to_string(), json!(uid.to_string()));
    }

    let item = payload::extract(kind, &body).map_err(|e| e.with_correlation(cid))?;
    let expected_version = if_match_version(&headers);
    let explicit_if_match = expected_version.is_some();

    state
        .sync_store
        .push_one_with_precondition(
            &ctx.pipeline.user_id.to_string(),
            kind,
            item,
            expected_version,
            explicit_if_match,
        )
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    Ok(Json(body))
}

/// `PATCH /v1/<kind>/{uid}`: merges a partial body into the existing
/// payload (ignoring `uid`/`sync` fields), honoring `If-Match`.
pub async fn merge(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path((kind_raw, uid)): Path<(String, Uuid)>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;
    let owner = ctx.pipeline.user_id.to_string();

    let existing = state
        .sync_store
        .get_one(&owner, kind, uid, false)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?
        .ok_or_else(|| SyncError::not_found(format!("{kind}/{uid}")).with_correlation(cid))?;

    let mut merged = existing.payload.clone();
    if let (Some(target), Some(patch_obj)) = (merged.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            if key == "uid" || key == "sync" {
                continue;
            }
            target.insert(key.clone(), value.clone());
        }
    }

    let item = payload::extract(kind, &merged).map_err(|e| e.with_correlation(cid))?;
    let explicit_if_match = if_match_version(&headers).is_some();
    let expected_version = if_match_version(&headers).or(Some(existing.version));

    state
        .sync_store
        .push_one_with_precondition(&owner, kind, item, expected_version, explicit_if_match)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    Ok(Json(merged))
}

/// `DELETE /v1/<kind>/{uid}`: soft delete, idempotent against an
/// already-deleted row. `task_list` cascades to its children, nulling
/// their `taskListUid` in the same transaction.
pub async fn delete(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path((kind_raw, uid)): Path<(String, Uuid)>,
) -> Result<StatusCode, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;
    let owner = ctx.pipeline.user_id.to_string();
    let now = now_ms();

    if kind == EntityKind::TaskList {
        state
            .sync_store
            .delete_task_list_cascading(&owner, uid, now)
            .await
            .map_err(|e| SyncError::from(e).with_correlation(cid))?;
        return Ok(StatusCode::NO_CONTENT);
    }

    let existing = state
        .sync_store
        .get_one(&owner, kind, uid, true)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    let Some(existing) = existing else {
        return Ok(StatusCode::NO_CONTENT);
    };
    if existing.is_tombstone() {
        return Ok(StatusCode::NO_CONTENT);
    }

    let item = PushItem {
        uid,
        updated_at_ms: now,
        deleted_at_ms: Some(now),
        client_version: existing.version,
        parent: existing.parent,
        payload: existing.payload,
    };
    state
        .sync_store
        .push_one_with_precondition(&owner, kind, item, None, false)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/<kind>/{uid}/archive`: sets `status=archived` (and
/// `archived=true` for kinds that use a boolean flag instead).
pub async fn archive(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path((kind_raw, uid)): Path<(String, Uuid)>,
) -> Result<Json<Value>, WithCorrelation> {
    apply_patch(&state, &ctx, &kind_raw, uid, |obj| {
        obj.insert("status".to_string(), json!("archived"));
        obj.insert("archived".to_string(), json!(true));
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub action: String,
}

/// `POST /v1/<kind>/{uid}/process`: dispatches a kind-specific action
/// vocabulary. Unknown actions return 400.
pub async fn process(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path((kind_raw, uid)): Path<(String, Uuid)>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;

    let mutation: fn(&mut serde_json::Map<String, Value>) = match (kind, body.action.as_str()) {
        (EntityKind::Note, "pin") => |obj| { obj.insert("pinned".to_string(), json!(true)); },
        (EntityKind::Note, "unpin") => |obj| { obj.insert("pinned".to_string(), json!(false)); },
        (EntityKind::Note, "archive") => |obj| { obj.insert("status".to_string(), json!("archived")); },
        (EntityKind::Note, "unarchive") => |obj| { obj.insert("status".to_string(), json!("active")); },
        (EntityKind::Task, "start") => |obj| { obj.insert("status".to_string(), json!("in_progress")); },
        (EntityKind::Task, "complete") => |obj| { obj.insert("status".to_string(), json!("completed")); },
        (EntityKind::Task, "reopen") => |obj| { obj.insert("status".to_string(), json!("open")); },
        (EntityKind::Chat, "resolve") => |obj| { obj.insert("status".to_string(), json!("resolved")); },
        (EntityKind::Chat, "reopen") => |obj| { obj.insert("status".to_string(), json!("open")); },
        (EntityKind::Comment, "resolve") => |obj| { obj.insert("status".to_string(), json!("resolved")); },
        (EntityKind::Comment, "reopen") => |obj| { obj.insert("status".to_string(), json!("open")); },
        (EntityKind::ChatMessage, "mark_read") => |obj| { obj.insert("readAt".to_string(), json!(true)); },
        (EntityKind::ChatMessage, "mark_delivered") => |obj| { obj.insert("deliveredAt".to_string(), json!(true)); },
        (EntityKind::TaskList, "unarchive") => |obj| { obj.insert("status".to_string(), json!("active")); },
        (EntityKind::TaskListCategory, "unarchive") => |obj| { obj.insert("status".to_string(), json!("active")); },
        _ => {
            return Err(SyncError::validation(format!(
                "unknown process action '{}' for kind {kind}",
                body.action
            ))
            .with_correlation(cid));
        }
    };

    apply_patch(&state, &ctx, &kind_raw, uid, mutation).await
}

async fn apply_patch(
    state: &AppState,
    ctx: &SyncContext,
    kind_raw: &str,
    uid: Uuid,
    mutate: impl FnOnce(&mut serde_json::Map<String, Value>),
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(kind_raw).map_err(|e| e.with_correlation(cid))?;
    let owner = ctx.pipeline.user_id.to_string();

    let existing = state
        .sync_store
        .get_one(&owner, kind, uid, false)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?
        .ok_or_else(|| SyncError::not_found(format!("{kind}/{uid}")).with_correlation(cid))?;

    let mut payload = existing.payload.clone();
    if let Some(obj) = payload.as_object_mut() {
        mutate(obj);
    }

    let item = payload::extract(kind, &payload).map_err(|e| e.with_correlation(cid))?;
    let ack = state
        .sync_store
        .push_one_with_precondition(&owner, kind, item, Some(existing.version), false)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    if !ack.is_ok() {
        return Err(SyncError::validation(ack.error.unwrap_or_default()).with_correlation(cid));
    }

    Ok(Json(payload))
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub items: Vec<Value>,
}

/// `POST /v1/sync/<kind>/push`: batched LWW push.
pub async fn push(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path(kind_raw): Path<String>,
    Json(body): Json<PushRequest>,
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;

    let mut items = Vec::with_capacity(body.items.len());
    let mut acks: Vec<Value> = Vec::new();
    for raw in &body.items {
        match payload::extract(kind, raw) {
            Ok(item) => items.push(item),
            Err(e) => acks.push(json!({ "uid": raw.get("uid"), "error": e.to_string() })),
        }
    }

    let push_acks = state
        .sync_store
        .push(&ctx.pipeline.user_id.to_string(), kind, items)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    acks.extend(push_acks.into_iter().map(|ack| {
        json!({
            "uid": ack.uid,
            "version": ack.version,
            "updatedAt": ack.updated_at_ms,
            "error": ack.error,
        })
    }));

    Ok(Json(json!({ "acks": acks })))
}

/// `GET /v1/sync/<kind>/pull`: cursor-paginated tombstone+upsert pull.
pub async fn pull(
    State(state): State<AppState>,
    ctx: SyncContext,
    Path(kind_raw): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, WithCorrelation> {
    let cid = ctx.pipeline.correlation_id;
    let kind = parse_kind(&kind_raw).map_err(|e| e.with_correlation(cid))?;
    let decoded = Cursor::decode(query.cursor.as_deref());
    let limit = query.limit.unwrap_or(500).clamp(1, 1000);

    let page = state
        .sync_store
        .pull(&ctx.pipeline.user_id.to_string(), kind, decoded.ms, decoded.uid, limit)
        .await
        .map_err(|e| SyncError::from(e).with_correlation(cid))?;

    Ok(Json(json!({
        "upserts": page.upserts.iter().map(|r| r.payload.clone()).collect::<Vec<_>>(),
        "deletes": page.deletes.iter().map(|d| json!({ "uid": d.uid, "deletedAt": d.deleted_at_ms })).collect::<Vec<_>>(),
        "nextCursor": page.next_cursor,
    })))
}

//! The tool registry: an ordered `name -> {descriptor, handler}` map
//! answering `tools/list` and `tools/call`.

use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Value, json};
use uuid::Uuid;

use ledgersync_core::{Cursor, EntityKind};
use ledgersync_storage::PushItem;

use crate::error::SyncError;
use crate::payload;
use crate::state::AppState;

/// A tool's MCP-facing metadata, returned by `tools/list`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

type ToolHandler =
    Arc<dyn Fn(AppState, Uuid, Value) -> BoxFuture<'static, Result<Value, SyncError>> + Send + Sync>;

struct ToolEntry {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

/// Read-only after startup: built once by [`build_registry`] and
/// never mutated.
pub struct ToolRegistry {
    entries: IndexMap<String, ToolEntry>,
}

impl ToolRegistry {
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries.values().map(|e| e.descriptor.clone()).collect()
    }

    /// Dispatches a `tools/call` invocation.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] (mapped to JSON-RPC
    /// `MethodNotFound` by the caller) if no tool with this name is
    /// registered, otherwise propagates the tool's own result.
    pub async fn call(
        &self,
        name: &str,
        state: AppState,
        owner: Uuid,
        args: Value,
    ) -> Result<Value, SyncError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| SyncError::validation(format!("unknown tool: {name}")))?;
        (entry.handler)(state, owner, args).await
    }
}

pub fn build_registry() -> ToolRegistry {
    let mut entries = IndexMap::new();

    entries.insert(
        "sync_info".to_string(),
        ToolEntry {
            descriptor: ToolDescriptor {
                name: "sync_info".to_string(),
                description: "Returns server sync capabilities and rate-limit policy".to_string(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            handler: Arc::new(|state, _owner, _args| Box::pin(async move { sync_info(&state) })),
        },
    );

    entries.insert(
        "sync_pull".to_string(),
        ToolEntry {
            descriptor: ToolDescriptor {
                name: "sync_pull".to_string(),
                description: "Pulls upserts and tombstones for one entity kind since a cursor".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "kind": { "type": "string" },
                        "cursor": { "type": "string" },
                        "limit": { "type": "integer" },
                    },
                    "required": ["kind"],
                }),
            },
            handler: Arc::new(|state, owner, args| Box::pin(sync_pull(state, owner, args))),
        },
    );

    entries.insert(
        "sync_push".to_string(),
        ToolEntry {
            descriptor: ToolDescriptor {
                name: "sync_push".to_string(),
                description: "Pushes a batch of items for one entity kind using LWW semantics".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "kind": { "type": "string" },
                        "items": { "type": "array" },
                    },
                    "required": ["kind", "items"],
                }),
            },
            handler: Arc::new(|state, owner, args| Box::pin(sync_push(state, owner, args))),
        },
    );

    entries.insert(
        "attach_context".to_string(),
        ToolEntry {
            descriptor: ToolDescriptor {
                name: "attach_context".to_string(),
                description: "Attaches an entity to the current MCP session's context list".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "uid": { "type": "string" },
                        "kind": { "type": "string" },
                        "title": { "type": "string" },
                    },
                    "required": ["uid", "kind"],
                }),
            },
            handler: Arc::new(|state, _owner, args| Box::pin(async move { attach_context(&state, args) })),
        },
    );

    entries.insert(
        "detach_context".to_string(),
        ToolEntry {
            descriptor: ToolDescriptor {
                name: "detach_context".to_string(),
                description: "Removes an entity from the current MCP session's context list".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "uid": { "type": "string" },
                        "kind": { "type": "string" },
                    },
                    "required": ["uid", "kind"],
                }),
            },
            handler: Arc::new(|state, _owner, args| Box::pin(async move { detach_context(&state, args) })),
        },
    );

    entries.insert(
        "list_context".to_string(),
        ToolEntry {
            descriptor: ToolDescriptor {
                name: "list_context".to_string(),
                description: "Lists the current MCP session's attached context entries".to_string(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            handler: Arc::new(|state, _owner, args| Box::pin(async move { list_context(&state, args) })),
        },
    );

    entries.insert(
        "clear_context".to_string(),
        ToolEntry {
            descriptor: ToolDescriptor {
                name: "clear_context".to_string(),
                description: "Clears every attached context entry for the current MCP session".to_string(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            handler: Arc::new(|state, _owner, args| Box::pin(async move { clear_context(&state, args) })),
        },
    );

    ToolRegistry { entries }
}

fn sync_info(state: &AppState) -> Result<Value, SyncError> {
    Ok(crate::handlers::sync::sync_info_body(state))
}

async fn sync_pull(state: AppState, owner: Uuid, args: Value) -> Result<Value, SyncError> {
    let kind = parse_kind(&args)?;
    let cursor_raw = args.get("cursor").and_then(Value::as_str);
    let cursor = Cursor::decode(cursor_raw);
    let limit = args
        .get("limit")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(500)
        .clamp(1, 1000);

    let page = state
        .sync_store
        .pull(&owner.to_string(), kind, cursor.ms, cursor.uid, limit)
        .await?;

    Ok(json!({
        "upserts": page.upserts.iter().map(|r| r.payload.clone()).collect::<Vec<_>>(),
        "deletes": page.deletes.iter().map(|d| json!({ "uid": d.uid, "deletedAt": d.deleted_at_ms })).collect::<Vec<_>>(),
        "nextCursor": page.next_cursor,
    }))
}

async fn sync_push(state: AppState, owner: Uuid, args: Value) -> Result<Value, SyncError> {
    let kind = parse_kind(&args)?;
    let items_raw = args
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::validation("items must be an array"))?;

    let mut items: Vec<PushItem> = Vec::with_capacity(items_raw.len());
    let mut extraction_errors = Vec::new();
    for raw in items_raw {
        match payload::extract(kind, raw) {
            Ok(item) => items.push(item),
            Err(e) => extraction_errors.push(json!({ "error": e.to_string() })),
        }
    }

    let acks = state.sync_store.push(&owner.to_string(), kind, items).await?;
    let mut results: Vec<Value> = acks
        .into_iter()
        .map(|ack| {
            json!({
                "uid": ack.uid,
                "version": ack.version,
                "updatedAt": ack.updated_at_ms,
                "error": ack.error,
            })
        })
        .collect();
    results.extend(extraction_errors);
    Ok(json!(results))
}

// MCP session id is threaded in through `args._session` by the caller
// (`mcp::handlers`); tools never see transport concerns directly, but
// the attachment list is keyed per MCP session.
fn session_id(args: &Value) -> Result<Uuid, SyncError> {
    args.get("_session")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| SyncError::internal("missing MCP session context"))
}

fn attach_context(state: &AppState, args: Value) -> Result<Value, SyncError> {
    let uid = args
        .get("uid")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| SyncError::validation("uid must be a valid UUID"))?;
    let kind = parse_kind(&args)?;
    let title = args.get("title").and_then(Value::as_str).map(str::to_string);
    let session_id = session_id(&args)?;
    state
        .attachments
        .attach(session_id, uid, kind, title)
        .map_err(|e| SyncError::validation(e.to_string()))?;
    Ok(json!({ "attached": true }))
}

fn detach_context(state: &AppState, args: Value) -> Result<Value, SyncError> {
    let uid = args
        .get("uid")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| SyncError::validation("uid must be a valid UUID"))?;
    let kind = parse_kind(&args)?;
    let session_id = session_id(&args)?;
    state.attachments.detach(session_id, uid, kind);
    Ok(json!({ "detached": true }))
}

fn list_context(state: &AppState, args: Value) -> Result<Value, SyncError> {
    let session_id = session_id(&args)?;
    let items: Vec<Value> = state
        .attachments
        .list(session_id)
        .into_iter()
        .map(|(uid, kind, title)| json!({ "uid": uid, "kind": kind.as_str(), "title": title }))
        .collect();
    Ok(json!({ "items": items }))
}

fn clear_context(state: &AppState, args: Value) -> Result<Value, SyncError> {
    let session_id = session_id(&args)?;
    state.attachments.clear(session_id);
    Ok(json!({ "cleared": true }))
}

fn parse_kind(args: &Value) -> Result<EntityKind, SyncError> {
    let raw = args
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::validation("kind is required"))?;
    EntityKind::from_str(raw).map_err(|_| SyncError::validation(format!("unknown kind: {raw}")))
}

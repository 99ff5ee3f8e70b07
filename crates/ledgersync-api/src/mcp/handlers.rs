//! The MCP Streamable-HTTP surface: `POST /mcp`, `GET /mcp`
//! (SSE), `DELETE /mcp`, plus the OAuth discovery endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::SyncError;
use crate::pipeline::PipelineContext;
use crate::state::AppState;

use super::SUPPORTED_PROTOCOL_VERSIONS;

const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";
const SESSION_HEADER: &str = "mcp-session-id";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mcp", post(json_rpc).get(sse).delete(end_session))
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth_authorization_server),
        )
        .route("/.well-known/oauth-protected-resource", get(oauth_protected_resource))
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Option<Value>, error: &SyncError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: jsonrpc_code(error),
                message: error.to_string(),
            }),
        }
    }
}

/// Maps a domain error onto a JSON-RPC 2.0 error code ("MCP tool
/// dispatch maps domain errors to JSON-RPC codes").
fn jsonrpc_code(error: &SyncError) -> i64 {
    match error {
        SyncError::Validation(_) | SyncError::Parent(_) | SyncError::NotFound(_) | SyncError::Gone(_) => {
            -32602 // Invalid params
        }
        SyncError::Auth(_) | SyncError::Forbidden(_) => -32001,
        SyncError::Precondition { .. } => -32003,
        SyncError::RateLimit { .. } => -32004,
        SyncError::Internal(_) => -32603, // Internal error
    }
}

fn origin_allowed(headers: &HeaderMap, state: &AppState) -> bool {
    if state.config.auth.dev_mode {
        return true;
    }
    let Some(origin) = headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        // Non-browser clients send no Origin; only browsers are subject to
        // the rebinding check.
        return true;
    };
    state.config.allowed_origins.iter().any(|allowed| allowed == origin)
}

fn protocol_version_ok(headers: &HeaderMap) -> bool {
    headers
        .get(PROTOCOL_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(&v))
}

/// `POST /mcp`: JSON-RPC 2.0 dispatch.
pub async fn json_rpc(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: PipelineContext,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    if !origin_allowed(&headers, &state) {
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    if request.method != "initialize" && !protocol_version_ok(&headers) {
        let body = JsonRpcResponse::err(
            request.id.clone(),
            &SyncError::validation("unsupported or missing Mcp-Protocol-Version"),
        );
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    match request.method.as_str() {
        "initialize" => handle_initialize(&state, &headers, &ctx, request.id),
        "tools/list" => handle_tools_list(&state, request.id),
        "tools/call" => handle_tools_call(&state, &headers, &ctx, request.id, request.params).await,
        other => {
            let body = JsonRpcResponse {
                jsonrpc: "2.0",
                id: request.id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32601,
                    message: format!("method not found: {other}"),
                }),
            };
            Json(body).into_response()
        }
    }
}

fn handle_initialize(
    state: &AppState,
    headers: &HeaderMap,
    ctx: &PipelineContext,
    id: Option<Value>,
) -> Response {
    let requested = headers
        .get(PROTOCOL_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[SUPPORTED_PROTOCOL_VERSIONS.len() - 1]);

    if !SUPPORTED_PROTOCOL_VERSIONS.contains(&requested) {
        let body = JsonRpcResponse::err(
            id,
            &SyncError::validation(format!("unsupported protocol version: {requested}")),
        );
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let session = state.mcp.sessions.create(ctx.user_id, requested);
    let result = json!({
        "protocolVersion": requested,
        "serverInfo": { "name": "ledgersync", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": {} },
    });

    let mut response = Json(JsonRpcResponse::ok(id, result)).into_response();
    if let Ok(value) = HeaderValue::from_str(&session.id.to_string()) {
        response.headers_mut().insert("Mcp-Session-Id", value);
    }
    response
}

/// Validates the `Mcp-Session-Id` header against the caller's identity for
/// every method but `initialize`.
fn authorize_session(state: &AppState, headers: &HeaderMap, ctx: &PipelineContext) -> Result<Uuid, SyncError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| SyncError::validation("Mcp-Session-Id header is required"))?;

    let session = state
        .mcp
        .sessions
        .get(session_id)
        .ok_or_else(|| SyncError::not_found("mcp session"))?;

    if session.user_id != ctx.user_id {
        return Err(SyncError::forbidden("mcp session belongs to a different user"));
    }

    Ok(session_id)
}

fn handle_tools_list(state: &AppState, id: Option<Value>) -> Response {
    let tools: Vec<Value> = state
        .mcp
        .tools
        .descriptors()
        .into_iter()
        .map(|d| serde_json::to_value(d).unwrap_or(Value::Null))
        .collect();
    Json(JsonRpcResponse::ok(id, json!({ "tools": tools }))).into_response()
}

async fn handle_tools_call(
    state: &AppState,
    headers: &HeaderMap,
    ctx: &PipelineContext,
    id: Option<Value>,
    params: Value,
) -> Response {
    let session_id = match authorize_session(state, headers, ctx) {
        Ok(id) => id,
        Err(e) => return Json(JsonRpcResponse::err(id, &e)).into_response(),
    };

    let name = params.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    let mut args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    if let Some(obj) = args.as_object_mut() {
        obj.insert("_session".to_string(), json!(session_id.to_string()));
    }

    match state.mcp.tools.call(&name, state.clone(), ctx.user_id, args).await {
        Ok(value) => {
            let envelope = json!({
                "content": [{ "type": "text", "text": value.to_string() }],
                "isError": false,
            });
            Json(JsonRpcResponse::ok(id, envelope)).into_response()
        }
        Err(e) => Json(JsonRpcResponse::err(id, &e)).into_response(),
    }
}

/// `GET /mcp`: the SSE server-push stream. Stays open until client
/// disconnect; write timeouts are disabled for this route at the server
/// level.
pub async fn sse(
    _ctx: PipelineContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let opening = stream::once(async { Ok(Event::default().comment("mcp stream open")) });
    let stream = opening.chain(stream::pending());
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// `DELETE /mcp`: ends the caller's MCP session.
pub async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: PipelineContext,
) -> StatusCode {
    if let Ok(session_id) = authorize_session(&state, &headers, &ctx) {
        state.mcp.sessions.delete(session_id);
    }
    StatusCode::NO_CONTENT
}

/// `GET /.well-known/oauth-authorization-server` (RFC 8414).
pub async fn oauth_authorization_server(State(state): State<AppState>) -> Json<Value> {
    let issuer = state.config.public_url.clone().unwrap_or_default();
    Json(json!({
        "issuer": state.config.auth.auth0_domain,
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/v1/auth/token/exchange"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "urn:ietf:params:oauth:grant-type:token-exchange"],
    }))
}

/// `GET /.well-known/oauth-protected-resource` (RFC 9728). "resource" here
/// is this API's own audience, not the MCP endpoint URL.
pub async fn oauth_protected_resource(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "resource": state.config.auth.auth0_audience,
        "authorization_servers": [state.config.auth.auth0_domain],
    }))
}

//! Router assembly: wires the REST/RPC surface (C9), the MCP front-end
//! (C10), and the cross-cutting layers (recovery, compression, CORS,
//! tracing) into one `Router<AppState>`.

use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::handlers::{auth, entity, sync};
use crate::mcp;
use crate::pipeline::{correlation_middleware, rate_limit_headers_middleware};
use crate::state::AppState;

/// Builds the full application router for `state`.
pub fn build(state: AppState) -> Router {
    let entity_routes = Router::new()
        .route("/v1/{kind}", get(entity::list).post(entity::create))
        .route(
            "/v1/{kind}/{uid}",
            get(entity::get_one).put(entity::replace).patch(entity::merge).delete(entity::delete),
        )
        .route("/v1/{kind}/{uid}/archive", post(entity::archive))
        .route("/v1/{kind}/{uid}/process", post(entity::process))
        .route("/v1/sync/{kind}/push", post(entity::push))
        .route("/v1/sync/{kind}/pull", get(entity::pull));

    let sync_routes = Router::new()
        .route("/v1/sync/info", get(sync::sync_info))
        .route("/v1/sync/sessions", post(sync::begin_session))
        .route("/v1/sync/sessions/{id}", delete(sync::end_session))
        .route("/v1/sync/state", get(sync::sync_state))
        .route("/v1/account/wipe", post(sync::wipe));

    let auth_routes = Router::new()
        .route("/v1/auth/token/exchange", post(auth::token_exchange))
        .route("/v1/auth/tenant", get(auth::tenant));

    let cors = build_cors_layer(&state);

    Router::new()
        .merge(entity_routes)
        .merge(sync_routes)
        .merge(auth_routes)
        .merge(mcp::router())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let correlation_id = req
                        .extensions()
                        .get::<Uuid>()
                        .copied()
                        .unwrap_or_else(Uuid::nil);
                    tracing::info_span!(
                        "http.request",
                        method = %req.method(),
                        uri = %req.uri(),
                        correlation_id = %correlation_id,
                        owner_id = tracing::field::Empty,
                        status_code = tracing::field::Empty,
                    )
                })
                .on_response(|res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                    span.record("status_code", tracing::field::display(res.status().as_u16()));
                    tracing::info!(parent: span, elapsed_ms = latency.as_millis(), "request handled");
                }),
        )
        .layer(middleware::from_fn(correlation_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

fn build_cors_layer(state: &AppState) -> CorsLayer {
    if state.config.allowed_origins.is_empty() {
        return CorsLayer::new();
    }
    let origins: Vec<_> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .max_age(Duration::from_secs(3600))
}


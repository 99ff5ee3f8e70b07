//! `AppState`: the shared, cloneable handle every axum handler and
//! middleware layer in this crate receives.

use std::sync::Arc;

use ledgersync_auth::{AuthGate, DirectoryService, Hs256Service};
use ledgersync_config::Config;
use ledgersync_storage::{DynOwnerStore, DynSyncStore};

use crate::attachments::AttachmentStore;
use crate::mcp::McpState;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::session::SessionStore;

/// Shared application state, cheap to clone (everything inside is an
/// `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth_gate: Arc<AuthGate>,
    pub sync_store: DynSyncStore,
    pub owner_store: DynOwnerStore,
    pub directory: Arc<dyn DirectoryService>,
    pub hs256: Arc<Hs256Service>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub attachments: Arc<AttachmentStore>,
    pub mcp: Arc<McpState>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        auth_gate: Arc<AuthGate>,
        sync_store: DynSyncStore,
        owner_store: DynOwnerStore,
        directory: Arc<dyn DirectoryService>,
        hs256: Arc<Hs256Service>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_ttl_seconds));
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            window_seconds: config.rate_limit_window_seconds,
            max_requests: config.rate_limit_max,
            burst: config.rate_limit_burst,
        }));
        Self {
            config,
            auth_gate,
            sync_store,
            owner_store,
            directory,
            hs256,
            sessions,
            rate_limiter,
            attachments: Arc::new(AttachmentStore::new()),
            mcp: Arc::new(McpState::new()),
        }
    }
}

//! Bootstraps the storage backend and auth gate from [`Config`] and builds
//! the runnable [`LedgersyncServer`].

use std::net::SocketAddr;
use std::sync::Arc;

use ledgersync_api::AppState;
use ledgersync_auth::introspection::IntrospectionClient;
use ledgersync_auth::{AuthGate, Hs256Service, JwtVerifier, ProviderJwksCache, ProviderJwksCacheConfig};
use ledgersync_config::Config;
use ledgersync_storage::{DynOwnerStore, DynSyncStore, StorageError};

use ledgersync_api::subject_store::{EmptyDirectoryService, InMemorySubjectStore};

/// The address a backend is selected from (`DATABASE_URL`).
///
/// `DATABASE_URL=memory` selects the in-process reference backend used by
/// local development and the test suite; anything else is treated as a
/// PostgreSQL connection string.
const MEMORY_BACKEND_URL: &str = "memory";

async fn create_storage(config: &Config) -> Result<(DynSyncStore, DynOwnerStore), anyhow::Error> {
    if config.database_url == MEMORY_BACKEND_URL {
        tracing::info!("using in-memory storage backend");
        let store = ledgersync_db_memory::create_memory_backend();
        let sync_store: DynSyncStore = store.clone();
        let owner_store: DynOwnerStore = store;
        return Ok((sync_store, owner_store));
    }

    tracing::info!("using PostgreSQL storage backend");
    let pg_config = ledgersync_db_postgres::PostgresConfig::new(config.database_url.clone())
        .with_run_migrations(true);
    let store = ledgersync_db_postgres::create_storage(pg_config)
        .await
        .map_err(|e: StorageError| anyhow::anyhow!("failed to initialize PostgreSQL storage: {e}"))?;
    let sync_store: DynSyncStore = store.clone();
    let owner_store: DynOwnerStore = store;
    Ok((sync_store, owner_store))
}

async fn build_auth_gate(config: &Config) -> Result<AuthGate, anyhow::Error> {
    let auth = &config.auth;
    auth.validate()
        .map_err(|e| anyhow::anyhow!("invalid auth configuration: {e}"))?;

    let jwks = Arc::new(ProviderJwksCache::new(ProviderJwksCacheConfig::new()));
    let jwks_uri = auth
        .jwks_uri()
        .map_err(|e| anyhow::anyhow!("invalid AUTH0_DOMAIN: {e}"))?;
    let verifier = Arc::new(JwtVerifier::new(
        jwks,
        jwks_uri,
        auth.issuer(),
        auth.auth0_audience.clone(),
    ));

    let introspection = if auth.introspection_configured() {
        let uri = auth
            .introspection_uri()
            .map_err(|e| anyhow::anyhow!("invalid AUTH0_DOMAIN: {e}"))?;
        Some(IntrospectionClient::new(
            uri,
            auth.introspection_client_id.clone().unwrap_or_default(),
            auth.introspection_client_secret.clone().unwrap_or_default(),
        ))
    } else {
        None
    };

    let subjects = Arc::new(InMemorySubjectStore::new());

    let hs256 = auth
        .hs256_secret
        .as_ref()
        .map(|secret| Arc::new(Hs256Service::new(secret.clone())));

    Ok(AuthGate::with_hs256(
        auth.clone(),
        verifier,
        introspection,
        subjects,
        hs256,
    ))
}

/// Builds the application router for `config`.
pub async fn build_app(config: Config) -> Result<axum::Router, anyhow::Error> {
    let (sync_store, owner_store) = create_storage(&config).await?;
    let auth_gate = Arc::new(build_auth_gate(&config).await?);
    let hs256 = Arc::new(Hs256Service::new(
        config.auth.hs256_secret.clone().unwrap_or_default(),
    ));
    let directory = Arc::new(EmptyDirectoryService);

    let state = AppState::new(
        Arc::new(config),
        auth_gate,
        sync_store,
        owner_store,
        directory,
        hs256,
    );

    Ok(ledgersync_api::build_router(state))
}

/// A bound, runnable server instance.
pub struct LedgersyncServer {
    addr: SocketAddr,
    app: axum::Router,
}

pub struct ServerBuilder {
    config: Config,
}

impl ServerBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Builds the router and binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if storage, the auth gate, or configuration
    /// validation fails.
    pub async fn build(self) -> Result<LedgersyncServer, anyhow::Error> {
        self.config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid HOST/PORT: {e}"))?;
        let app = build_app(self.config).await?;
        Ok(LedgersyncServer { addr, app })
    }
}

impl LedgersyncServer {
    /// Runs the server until a shutdown signal (Ctrl-C) is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server
    /// loop itself fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

//! # ledgersync-auth
//!
//! The auth gate for the ledgersync sync server (component C7), plus the
//! pieces that ride alongside it: tenant resolution (C11) and token
//! exchange (C12).
//!
//! ## Overview
//!
//! Incoming requests carry one of: an RS256 access token minted by the
//! external identity provider, a backend HS256 token minted by this
//! server's own token exchange endpoint, or — in dev mode only — an
//! `X-Debug-Sub` header. [`gate::AuthGate`] is the single entry point that
//! resolves any of these to a stable [`gate::AuthContext`].
//!
//! This crate deliberately does not depend on `axum`: it has no opinion on
//! how a request's headers get extracted or how an [`error::AuthError`]
//! becomes an HTTP response. That's `ledgersync-api`'s job.
//!
//! ## Modules
//!
//! - [`config`] — auth gate configuration, derived from `AUTH0_*`/`JWT_*` env vars
//! - [`error`] — [`error::AuthError`] and its OAuth2 error-code mapping
//! - [`jwks`] — provider JWKS cache with TTL, per-kid lookup, background retry
//! - [`jwt`] — RS256 verification and HS256 signing/verification
//! - [`introspection`] — RFC 7662 fallback when JWKS verification fails
//! - [`dev_mode`] — the `X-Debug-Sub` bypass
//! - [`subject`] — `subject -> app_user` resolution
//! - [`tenant`] — tenant resolution via an external directory service (C11)
//! - [`token_exchange`] — RFC 8693 token exchange (C12)
//! - [`gate`] — [`gate::AuthGate`], the orchestrator tying the above together

pub mod config;
pub mod dev_mode;
pub mod error;
pub mod gate;
pub mod introspection;
pub mod jwks;
pub mod jwt;
pub mod subject;
pub mod tenant;
pub mod token_exchange;

pub use config::AuthConfig;
pub use error::AuthError;
pub use gate::{AuthContext, AuthGate};
pub use jwks::{JwksError, ProviderJwksCache, ProviderJwksCacheConfig};
pub use jwt::{AccessClaims, AudienceClaim, BackendClaims, Hs256Service, JwtVerifier};
pub use subject::SubjectStore;
pub use tenant::{DirectoryService, Membership, TenantResolution, resolve_tenant};
pub use token_exchange::{TOKEN_EXCHANGE_GRANT_TYPE, TokenExchangeRequest, TokenExchangeResponse, exchange};

/// Type alias for auth gate results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ledgersync_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::AuthConfig;
    pub use crate::error::AuthError;
    pub use crate::gate::{AuthContext, AuthGate};
    pub use crate::jwt::{AccessClaims, BackendClaims, Hs256Service, JwtVerifier};
    pub use crate::subject::SubjectStore;
    pub use crate::tenant::{DirectoryService, TenantResolution, resolve_tenant};
    pub use crate::token_exchange::{TokenExchangeRequest, TokenExchangeResponse, exchange};
}

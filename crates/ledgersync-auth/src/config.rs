//! Auth gate configuration (component C7).
//!
//! Every field here maps to one of the `AUTH0_*` / `JWT_*` environment
//! variables read by [`ledgersync_config::Config`]; that crate owns parsing
//! env vars and hands a populated [`AuthConfig`] to this one.

use serde::{Deserialize, Serialize};

/// Configuration for the C7 auth gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Auth0 (or compatible OIDC provider) domain, e.g.
    /// `"tenant.us.auth0.com"`. The JWKS endpoint is derived as
    /// `https://{domain}/.well-known/jwks.json` and the issuer as
    /// `https://{domain}/`.
    pub auth0_domain: String,

    /// Expected `aud` claim on incoming access tokens.
    pub auth0_audience: String,

    /// Client ID used to authenticate to the introspection endpoint when
    /// JWKS verification fails (expired kid, rotated key, opaque token).
    pub introspection_client_id: Option<String>,

    /// Client secret paired with `introspection_client_id`.
    pub introspection_client_secret: Option<String>,

    /// HMAC secret for HS256 tokens: backend-minted tokens (token exchange,
    /// §C12) and, when `dev_mode` is set, locally signed test tokens.
    pub hs256_secret: Option<String>,

    /// Enables the `X-Debug-Sub` bypass header and HS256 verification
    /// without a configured provider. Must be off in production; every use
    /// is logged at `warn`.
    pub dev_mode: bool,

    /// Trust an upstream reverse proxy's `X-Forwarded-*` identity headers
    /// instead of verifying a bearer token directly.
    pub trust_proxy_auth: bool,

    /// Tenant ID used when a subject has exactly one membership and no
    /// explicit tenant was requested.
    pub default_tenant_id: Option<String>,
}

impl AuthConfig {
    /// Returns the issuer URL derived from `auth0_domain`.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.auth0_domain.trim_end_matches('/'))
    }

    /// Returns the JWKS endpoint URL derived from `auth0_domain`.
    #[must_use]
    pub fn jwks_uri(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&format!(
            "https://{}/.well-known/jwks.json",
            self.auth0_domain.trim_end_matches('/')
        ))
    }

    /// Returns the RFC 7662 introspection endpoint derived from
    /// `auth0_domain`.
    #[must_use]
    pub fn introspection_uri(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&format!(
            "https://{}/oauth/token/introspect",
            self.auth0_domain.trim_end_matches('/')
        ))
    }

    /// Validates that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns an error if dev mode is off but no provider is configured,
    /// or if introspection credentials are partially set.
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.auth0_domain.is_empty() {
            return Err("auth0_domain is required outside dev mode".to_string());
        }
        if self.introspection_client_id.is_some() != self.introspection_client_secret.is_some() {
            return Err(
                "introspection_client_id and introspection_client_secret must be set together"
                    .to_string(),
            );
        }
        Ok(())
    }

    /// `true` if introspection fallback is configured.
    #[must_use]
    pub fn introspection_configured(&self) -> bool {
        self.introspection_client_id.is_some() && self.introspection_client_secret.is_some()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth0_domain: String::new(),
            auth0_audience: String::new(),
            introspection_client_id: None,
            introspection_client_secret: None,
            hs256_secret: None,
            dev_mode: false,
            trust_proxy_auth: false,
            default_tenant_id: None,
        }
    }
}

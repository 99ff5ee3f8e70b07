//! The auth gate (component C7): the single entry point request handling
//! code calls to authenticate a request.
//!
//! Resolution order: RS256 verification against the provider's JWKS
//! (primary path) → RFC 7662 introspection fallback (when configured and
//! JWKS verification fails) → `X-Debug-Sub` dev-mode bypass (only
//! consulted when no bearer token was presented and dev mode is on).
//! Whichever path succeeds, the resulting subject is resolved to a stable
//! `app_user` id via [`SubjectStore`].

use std::sync::Arc;

use jsonwebtoken::Algorithm;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::dev_mode;
use crate::error::AuthError;
use crate::introspection::IntrospectionClient;
use crate::jwt::{Hs256Service, JwtVerifier};
use crate::subject::SubjectStore;

/// The authenticated identity produced by the gate, ready for the request
/// pipeline's downstream stages (session, epoch, rate limit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Raw `sub` claim (or debug-sub value) before subject resolution.
    pub subject: String,
    /// Stable `app_user` id.
    pub user_id: Uuid,
    /// `true` if this request was authenticated via the dev-mode bypass.
    pub dev_mode_bypass: bool,
}

/// Ties together JWKS verification, introspection fallback, dev-mode
/// bypass, and subject resolution.
pub struct AuthGate {
    config: AuthConfig,
    verifier: Arc<JwtVerifier>,
    introspection: Option<IntrospectionClient>,
    subjects: Arc<dyn SubjectStore>,
    /// Set only when the server is configured with a shared HS256 secret
    /// (`JWT_HS256_SECRET`/`hs256_secret`); legacy/dev bearer tokens are
    /// otherwise rejected alongside any other unverifiable token.
    hs256: Option<Arc<Hs256Service>>,
}

impl AuthGate {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        verifier: Arc<JwtVerifier>,
        introspection: Option<IntrospectionClient>,
        subjects: Arc<dyn SubjectStore>,
    ) -> Self {
        Self::with_hs256(config, verifier, introspection, subjects, None)
    }

    #[must_use]
    pub fn with_hs256(
        config: AuthConfig,
        verifier: Arc<JwtVerifier>,
        introspection: Option<IntrospectionClient>,
        subjects: Arc<dyn SubjectStore>,
        hs256: Option<Arc<Hs256Service>>,
    ) -> Self {
        Self {
            config,
            verifier,
            introspection,
            subjects,
            hs256,
        }
    }

    /// Authenticates a request given its `Authorization: Bearer` token (if
    /// any) and its `X-Debug-Sub` header (if any).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] if no credentials are present,
    /// and propagates verification/introspection/resolution errors
    /// otherwise.
    pub async fn authenticate(
        &self,
        bearer_token: Option<&str>,
        debug_sub_header: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        if let Some(token) = bearer_token {
            return self.authenticate_bearer(token).await;
        }

        if self.config.dev_mode {
            if let Some(subject) = dev_mode::resolve(&self.config, debug_sub_header)? {
                let user_id = self.subjects.resolve(&subject).await?;
                return Ok(AuthContext {
                    subject,
                    user_id,
                    dev_mode_bypass: true,
                });
            }
        }

        Err(AuthError::unauthorized("no credentials presented"))
    }

    async fn authenticate_bearer(&self, token: &str) -> Result<AuthContext, AuthError> {
        if let Some(hs256) = &self.hs256 {
            let alg = jsonwebtoken::decode_header(token).ok().map(|h| h.alg);
            if alg == Some(Algorithm::HS256) {
                let claims = hs256.decode(token)?;
                let user_id = self.subjects.resolve(&claims.sub).await?;
                return Ok(AuthContext {
                    subject: claims.sub,
                    user_id,
                    dev_mode_bypass: false,
                });
            }
        }

        let subject = match self.verifier.verify(token).await {
            Ok(claims) => claims.sub,
            Err(jwks_err) => {
                let Some(introspection) = &self.introspection else {
                    return Err(jwks_err);
                };
                tracing::debug!(error = %jwks_err, "JWKS verification failed, falling back to introspection");
                let response = introspection.introspect(token, &self.config.auth0_audience).await?;
                response
                    .sub
                    .ok_or_else(|| AuthError::invalid_token("introspection response has no sub"))?
            }
        };

        let user_id = self.subjects.resolve(&subject).await?;
        Ok(AuthContext {
            subject,
            user_id,
            dev_mode_bypass: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashMap;

    struct InMemorySubjectStore {
        rows: DashMap<String, Uuid>,
    }

    #[async_trait]
    impl SubjectStore for InMemorySubjectStore {
        async fn resolve(&self, subject: &str) -> Result<Uuid, AuthError> {
            Ok(*self.rows.entry(subject.to_string()).or_insert_with(Uuid::new_v4))
        }
    }

    fn gate_without_verifier(dev_mode: bool) -> AuthGate {
        let config = AuthConfig {
            dev_mode,
            ..Default::default()
        };
        let jwks = Arc::new(crate::jwks::ProviderJwksCache::new(crate::jwks::ProviderJwksCacheConfig::default()));
        let verifier = Arc::new(JwtVerifier::new(
            jwks,
            url::Url::parse("https://example.test/.well-known/jwks.json").unwrap(),
            "https://example.test/".to_string(),
            "aud".to_string(),
        ));
        AuthGate::new(
            config,
            verifier,
            None,
            Arc::new(InMemorySubjectStore { rows: DashMap::new() }),
        )
    }

    fn gate_with_hs256(secret: &str) -> AuthGate {
        let config = AuthConfig {
            hs256_secret: Some(secret.to_string()),
            dev_mode: true,
            ..Default::default()
        };
        let jwks = Arc::new(crate::jwks::ProviderJwksCache::new(crate::jwks::ProviderJwksCacheConfig::default()));
        let verifier = Arc::new(JwtVerifier::new(
            jwks,
            url::Url::parse("https://example.test/.well-known/jwks.json").unwrap(),
            "https://example.test/".to_string(),
            "aud".to_string(),
        ));
        AuthGate::with_hs256(
            config,
            verifier,
            None,
            Arc::new(InMemorySubjectStore { rows: DashMap::new() }),
            Some(Arc::new(Hs256Service::new(secret))),
        )
    }

    fn backend_claims(sub: &str) -> crate::jwt::BackendClaims {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        crate::jwt::BackendClaims {
            sub: sub.to_string(),
            iss: "backend".to_string(),
            aud: "mcp".to_string(),
            exp: now + 3600,
            iat: now,
            token_type: "backend".to_string(),
            exchanged_from: "mcp_oauth".to_string(),
        }
    }

    #[tokio::test]
    async fn hs256_bearer_token_authenticates_when_configured() {
        let secret = "a-shared-secret-long-enough-for-hmac";
        let gate = gate_with_hs256(secret);
        let token = Hs256Service::new(secret).encode(&backend_claims("user-1")).unwrap();

        let ctx = gate.authenticate(Some(&token), None).await.unwrap();
        assert_eq!(ctx.subject, "user-1");
        assert!(!ctx.dev_mode_bypass);
    }

    #[tokio::test]
    async fn hs256_bearer_token_rejected_with_wrong_secret() {
        let gate = gate_with_hs256("correct-secret-long-enough-here");
        let token = Hs256Service::new("wrong-secret-also-long-enough")
            .encode(&backend_claims("user-1"))
            .unwrap();

        let result = gate.authenticate(Some(&token), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_request_with_no_credentials() {
        let gate = gate_without_verifier(false);
        let result = gate.authenticate(None, None).await;
        assert!(matches!(result, Err(AuthError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn dev_mode_bypass_resolves_subject() {
        let gate = gate_without_verifier(true);
        let ctx = gate.authenticate(None, Some("auth0|debug-user")).await.unwrap();
        assert_eq!(ctx.subject, "auth0|debug-user");
        assert!(ctx.dev_mode_bypass);
    }

    #[tokio::test]
    async fn dev_mode_off_still_rejects_without_bearer() {
        let gate = gate_without_verifier(false);
        let result = gate.authenticate(None, Some("auth0|debug-user")).await;
        assert!(matches!(result, Err(AuthError::Unauthorized { .. })));
    }
}

//! JWT verification and minting for the C7 auth gate and C12 token exchange.
//!
//! Two signing algorithms are in play:
//!
//! - **RS256**: access tokens minted by the external identity provider,
//!   verified against [`crate::jwks::ProviderJwksCache`]. This server never
//!   signs RS256 tokens.
//! - **HS256**: backend-minted tokens (token exchange, §C12) and, in dev
//!   mode, locally issued test tokens. Signed and verified with a shared
//!   secret.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use crate::error::AuthError;
use crate::jwks::ProviderJwksCache;

/// Claims expected on an access token minted by the external identity
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub sub: String,
    #[serde(default)]
    pub aud: AudienceClaim,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// `aud` may be a single string or an array per the JWT spec; Auth0 emits
/// both depending on whether the audience array has one entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AudienceClaim {
    #[default]
    None,
    Single(String),
    Many(Vec<String>),
}

impl AudienceClaim {
    #[must_use]
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::None => false,
            Self::Single(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

/// Claims on a backend-minted token (token exchange, §C12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
    pub exchanged_from: String,
}

/// Verifies RS256 access tokens against a provider's JWKS, with readiness
/// tracking and background retry for the initial fetch.
pub struct JwtVerifier {
    jwks: Arc<ProviderJwksCache>,
    jwks_uri: Url,
    issuer: String,
    audience: String,
    ready: Arc<AtomicBool>,
    retrying: Arc<AtomicBool>,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(jwks: Arc<ProviderJwksCache>, jwks_uri: Url, issuer: String, audience: String) -> Self {
        Self {
            jwks,
            jwks_uri,
            issuer,
            audience,
            ready: Arc::new(AtomicBool::new(false)),
            retrying: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` once the JWKS has been fetched successfully at least once.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Starts a background task that retries the initial JWKS fetch with
    /// exponential backoff (5s, 10s, 20s, ... capped at 60s) until it
    /// succeeds, then exits. Idempotent: if a retry cycle is already
    /// running, this returns that cycle's cancellation handle instead of
    /// starting a second one. A fresh `watch` channel is only created when
    /// a new cycle actually starts, after the previous one has exited.
    pub fn start_background_retry(self: &Arc<Self>) -> watch::Sender<()> {
        let (tx, mut rx) = watch::channel(());

        if self
            .retrying
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return tx;
        }

        let verifier = Arc::clone(self);
        tokio::spawn(async move {
            let mut delay = Duration::from_secs(5);
            loop {
                if verifier.is_ready() {
                    break;
                }
                tokio::select! {
                    _ = rx.changed() => break,
                    result = verifier.jwks.refresh(&verifier.jwks_uri) => {
                        match result {
                            Ok(()) => {
                                verifier.ready.store(true, Ordering::Release);
                                tracing::info!("JWKS became ready");
                                break;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, delay_secs = delay.as_secs(), "JWKS fetch failed, retrying");
                                tokio::time::sleep(delay).await;
                                delay = (delay * 2).min(Duration::from_secs(60));
                            }
                        }
                    }
                }
            }
            verifier.retrying.store(false, Ordering::Release);
        });

        tx
    }

    /// Decodes and validates an RS256 access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the token is malformed, the
    /// signature doesn't verify, the issuer/audience don't match, or the
    /// signing key can't be found in the JWKS.
    pub async fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AuthError::invalid_token(format!("malformed header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid_token("token has no kid"))?;

        let (decoding_key, alg) = self
            .jwks
            .get_key(&self.jwks_uri, &kid)
            .await
            .map_err(|e| AuthError::invalid_token(format!("no matching JWKS key: {e}")))?;

        let mut validation = Validation::new(alg.unwrap_or(Algorithm::RS256));
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        validation.validate_aud = false; // aud may be single-or-array; checked explicitly below

        let data = decode::<AccessClaims>(token, &decoding_key, &validation)
            .map_err(|e| AuthError::invalid_token(e.to_string()))?;

        if !data.claims.aud.contains(&self.audience) {
            return Err(AuthError::invalid_token("audience mismatch"));
        }

        Ok(data.claims)
    }
}

/// Signs and verifies HS256 backend tokens (token exchange output, dev-mode
/// test tokens).
pub struct Hs256Service {
    secret: String,
}

impl Hs256Service {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the claims can't be encoded.
    pub fn encode(&self, claims: &BackendClaims) -> Result<String, AuthError> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&header, claims, &key).map_err(|e| AuthError::internal(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if verification fails.
    pub fn decode(&self, token: &str) -> Result<BackendClaims, AuthError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        decode::<BackendClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::invalid_token(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_claim_contains_single_and_many() {
        assert!(AudienceClaim::Single("a".into()).contains("a"));
        assert!(!AudienceClaim::Single("a".into()).contains("b"));
        assert!(AudienceClaim::Many(vec!["a".into(), "b".into()]).contains("b"));
        assert!(!AudienceClaim::None.contains("a"));
    }

    #[test]
    fn hs256_round_trip() {
        let service = Hs256Service::new("test-secret-at-least-this-long");
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = BackendClaims {
            sub: "user-1".to_string(),
            iss: "backend".to_string(),
            aud: "mcp".to_string(),
            exp: now + 3600,
            iat: now,
            token_type: "backend".to_string(),
            exchanged_from: "mcp_oauth".to_string(),
        };

        let token = service.encode(&claims).unwrap();
        let decoded = service.decode(&token).unwrap();
        assert_eq!(decoded.sub, "user-1");
        assert_eq!(decoded.token_type, "backend");
    }

    #[test]
    fn hs256_rejects_wrong_secret() {
        let service = Hs256Service::new("secret-one-is-long-enough");
        let other = Hs256Service::new("secret-two-is-long-enough");
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = BackendClaims {
            sub: "user-1".to_string(),
            iss: "backend".to_string(),
            aud: "mcp".to_string(),
            exp: now + 3600,
            iat: now,
            token_type: "backend".to_string(),
            exchanged_from: "mcp_oauth".to_string(),
        };
        let token = service.encode(&claims).unwrap();
        assert!(other.decode(&token).is_err());
    }

    #[test]
    fn hs256_rejects_expired() {
        let service = Hs256Service::new("secret-long-enough-for-hmac");
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = BackendClaims {
            sub: "user-1".to_string(),
            iss: "backend".to_string(),
            aud: "mcp".to_string(),
            exp: now - 3600,
            iat: now - 7200,
            token_type: "backend".to_string(),
            exchanged_from: "mcp_oauth".to_string(),
        };
        let token = service.encode(&claims).unwrap();
        assert!(service.decode(&token).is_err());
    }
}

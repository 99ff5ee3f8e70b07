//! Token introspection fallback (RFC 7662), used when JWKS verification
//! fails — an opaque token, a kid the JWKS hasn't caught up to yet, or a
//! token from a grant flow that never produces a JWT.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthError;

/// Introspection response per RFC 7662. `active` is the only field the
/// protocol guarantees; everything else is populated only for active
/// tokens.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Client for the RFC 7662 introspection endpoint.
pub struct IntrospectionClient {
    http: reqwest::Client,
    endpoint: Url,
    client_id: String,
    client_secret: String,
}

/// Default token expiry assumed when the introspection response omits
/// `exp`, per the auth gate spec.
pub const DEFAULT_EXPIRY_SECS: i64 = 5 * 60;

impl IntrospectionClient {
    #[must_use]
    pub fn new(endpoint: Url, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Introspects `token`, returning the resolved expiry (falling back to
    /// [`DEFAULT_EXPIRY_SECS`] from now if the provider omits `exp`) and the
    /// subject, when the token is active.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IdentityProvider`] if the request fails, and
    /// [`AuthError::InvalidToken`] if the provider reports the token
    /// inactive.
    pub async fn introspect(&self, token: &str, audience: &str) -> Result<IntrospectionResponse, AuthError> {
        let params = [
            ("token", token),
            ("token_type_hint", "access_token"),
            ("audience", audience),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];

        tracing::debug!(path = "introspection", "calling token introspection endpoint");

        let response = self
            .http
            .post(self.endpoint.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::identity_provider(format!("introspection request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::identity_provider(format!(
                "introspection endpoint returned {}",
                response.status()
            )));
        }

        let body: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::identity_provider(format!("malformed introspection response: {e}")))?;

        if !body.active {
            return Err(AuthError::invalid_token("token reported inactive by introspection"));
        }

        Ok(body)
    }
}

/// Resolves the effective expiry timestamp for an introspection response,
/// applying [`DEFAULT_EXPIRY_SECS`] when the provider didn't report `exp`.
#[must_use]
pub fn resolved_expiry(response: &IntrospectionResponse, now: i64) -> i64 {
    response.exp.unwrap_or(now + DEFAULT_EXPIRY_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_expiry_falls_back_to_default() {
        let response = IntrospectionResponse {
            active: true,
            ..Default::default()
        };
        assert_eq!(resolved_expiry(&response, 1_000), 1_000 + DEFAULT_EXPIRY_SECS);
    }

    #[test]
    fn resolved_expiry_uses_provider_value_when_present() {
        let response = IntrospectionResponse {
            active: true,
            exp: Some(5_000),
            ..Default::default()
        };
        assert_eq!(resolved_expiry(&response, 1_000), 5_000);
    }

    #[tokio::test]
    async fn introspect_rejects_inactive_token() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({"active": false})))
            .mount(&server)
            .await;

        let client = IntrospectionClient::new(
            url::Url::parse(&server.uri()).unwrap(),
            "client",
            "secret",
        );

        let result = client.introspect("some-token", "aud").await;
        assert!(matches!(result, Err(AuthError::InvalidToken { .. })));
    }

    #[tokio::test]
    async fn introspect_returns_claims_for_active_token() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "active": true,
                "sub": "user-1",
                "client_id": "client-1",
            })))
            .mount(&server)
            .await;

        let client = IntrospectionClient::new(
            url::Url::parse(&server.uri()).unwrap(),
            "client",
            "secret",
        );

        let response = client.introspect("some-token", "aud").await.unwrap();
        assert_eq!(response.sub.as_deref(), Some("user-1"));
        assert!(response.exp.is_none());
    }
}

//! Token exchange (component C12, RFC 8693).
//!
//! Accepts an already-validated incoming bearer subject (the caller runs it
//! through the C7 gate first) and mints a backend HS256 token scoped to the
//! requested audience.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::jwt::{BackendClaims, Hs256Service};

/// The only grant type this endpoint accepts.
pub const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Backend tokens are valid for one hour.
pub const BACKEND_TOKEN_TTL_SECS: i64 = 3600;

/// `POST /v1/auth/token/exchange` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeRequest {
    pub grant_type: String,
    pub audience: String,
    #[serde(default)]
    pub subject_token: Option<String>,
}

/// `POST /v1/auth/token/exchange` response body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub issued_token_type: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Mints a backend HS256 JWT for `subject`, scoped to `request.audience`,
/// per RFC 8693.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedGrantType`] if the grant type isn't
/// [`TOKEN_EXCHANGE_GRANT_TYPE`], and propagates signing failures.
pub fn exchange(
    hs256: &Hs256Service,
    subject: &str,
    request: &TokenExchangeRequest,
    now: i64,
) -> Result<TokenExchangeResponse, AuthError> {
    if request.grant_type != TOKEN_EXCHANGE_GRANT_TYPE {
        return Err(AuthError::unsupported_grant_type(request.grant_type.clone()));
    }

    let claims = BackendClaims {
        sub: subject.to_string(),
        iss: "backend".to_string(),
        aud: request.audience.clone(),
        exp: now + BACKEND_TOKEN_TTL_SECS,
        iat: now,
        token_type: "backend".to_string(),
        exchanged_from: "mcp_oauth".to_string(),
    };

    let access_token = hs256.encode(&claims)?;

    Ok(TokenExchangeResponse {
        access_token,
        issued_token_type: "urn:ietf:params:oauth:token-type:access_token".to_string(),
        token_type: "Bearer".to_string(),
        expires_in: BACKEND_TOKEN_TTL_SECS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_grant_type() {
        let hs256 = Hs256Service::new("secret-long-enough-for-hmac");
        let request = TokenExchangeRequest {
            grant_type: "authorization_code".to_string(),
            audience: "mcp".to_string(),
            subject_token: None,
        };
        let result = exchange(&hs256, "user-1", &request, 1_000);
        assert!(matches!(result, Err(AuthError::UnsupportedGrantType { .. })));
    }

    #[test]
    fn mints_backend_token_for_valid_request() {
        let hs256 = Hs256Service::new("secret-long-enough-for-hmac");
        let request = TokenExchangeRequest {
            grant_type: TOKEN_EXCHANGE_GRANT_TYPE.to_string(),
            audience: "mcp".to_string(),
            subject_token: None,
        };
        let response = exchange(&hs256, "user-1", &request, 1_000).unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, BACKEND_TOKEN_TTL_SECS);

        let claims = hs256.decode(&response.access_token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.aud, "mcp");
        assert_eq!(claims.exchanged_from, "mcp_oauth");
        assert_eq!(claims.exp, 1_000 + BACKEND_TOKEN_TTL_SECS);
    }
}

//! Authentication error types for the C7 auth gate.

/// Errors that can occur while authenticating a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request carries no credentials at all.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The bearer token is malformed, has a bad signature, or fails claim
    /// validation.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token decoded and validated, but the subject is not entitled to
    /// the requested tenant/scope.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// The access token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The requested grant type is not supported by the token endpoint.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The identity provider (JWKS endpoint or introspection endpoint)
    /// returned an error or could not be reached.
    #[error("Identity provider error: {message}")]
    IdentityProvider {
        /// Description of the error.
        message: String,
    },

    /// The auth configuration itself is invalid (missing issuer, bad URL,
    /// dev mode left on where it shouldn't be, ...).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred (subject store, tenant
    /// directory, etc).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    #[must_use]
    pub fn identity_provider(message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a token-related error (expired, invalid,
    /// malformed).
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::InvalidToken { .. } | Self::TokenExpired)
    }

    /// The OAuth 2.0 error code for this error, used in `WWW-Authenticate`
    /// and token-endpoint error bodies.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidToken { .. } | Self::TokenExpired => "invalid_token",
            Self::Forbidden { .. } => "access_denied",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::IdentityProvider { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => "server_error",
        }
    }
}

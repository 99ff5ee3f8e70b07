//! Dev-mode bypass: trusts an `X-Debug-Sub` header instead of verifying a
//! bearer token. Only ever consulted when [`AuthConfig::dev_mode`] is set;
//! every use is logged at `warn` so it can't silently slip into a
//! production trace.
//!
//! [`AuthConfig::dev_mode`]: crate::config::AuthConfig::dev_mode

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Header carrying the bypass subject.
pub const DEBUG_SUB_HEADER: &str = "X-Debug-Sub";

/// Resolves the `X-Debug-Sub` header to a trusted subject, if dev mode is
/// enabled and the header is present.
///
/// # Errors
///
/// Returns [`AuthError::Configuration`] if dev mode is disabled — callers
/// must not invoke this path otherwise.
pub fn resolve(config: &AuthConfig, header_value: Option<&str>) -> Result<Option<String>, AuthError> {
    if !config.dev_mode {
        return Err(AuthError::configuration(
            "dev-mode bypass invoked while dev_mode is disabled",
        ));
    }

    match header_value {
        Some(sub) if !sub.is_empty() => {
            tracing::warn!(subject = sub, "request authenticated via X-Debug-Sub dev-mode bypass");
            Ok(Some(sub.to_string()))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_when_dev_mode_disabled() {
        let config = AuthConfig::default();
        let result = resolve(&config, Some("user-1"));
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }

    #[test]
    fn returns_none_without_header() {
        let config = AuthConfig {
            dev_mode: true,
            ..Default::default()
        };
        assert_eq!(resolve(&config, None).unwrap(), None);
    }

    #[test]
    fn returns_subject_when_present() {
        let config = AuthConfig {
            dev_mode: true,
            ..Default::default()
        };
        assert_eq!(resolve(&config, Some("user-1")).unwrap(), Some("user-1".to_string()));
    }
}

//! Environment-driven configuration for the ledgersync sync server.
//!
//! [`Config`] is a flat struct populated by [`Config::from_env()`], reading
//! exactly the environment variable names this server reads. There is
//! no layered file/database/API config source, hot-reloading, or watcher
//! here: this server reads its environment once at startup and does not
//! support live reconfiguration.

use serde::{Deserialize, Serialize};

use ledgersync_auth::AuthConfig;

/// Default session TTL: 30 minutes.
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 30 * 60;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Top-level server configuration, read once at startup from the
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind host, e.g. `"0.0.0.0"`.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Public-facing base URL, used in OAuth discovery documents and links.
    pub public_url: Option<String>,
    /// CORS allow-list, parsed from a comma-separated list.
    pub allowed_origins: Vec<String>,

    /// Primary database connection string.
    pub database_url: String,
    /// Database used by the integration test suite, when set.
    pub test_database_url: Option<String>,

    /// Auth gate configuration (component C7).
    pub auth: AuthConfig,

    /// Session TTL in seconds (default: 30 min).
    pub session_ttl_seconds: u64,

    /// Rate limiter window, in seconds (component C6).
    pub rate_limit_window_seconds: u64,
    /// Rate limiter max requests per window.
    pub rate_limit_max: u32,
    /// Rate limiter burst capacity (bucket size).
    pub rate_limit_burst: u32,
}

impl Config {
    /// Loads configuration from the process environment, applying
    /// `.env` overrides via `dotenvy` first if a `.env` file is present.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error if a required variable is missing or a
    /// numeric variable fails to parse.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is required".to_string())?;
        let test_database_url = std::env::var("TEST_DATABASE_URL").ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
        let port = parse_env_or("PORT", default_port())?;
        let public_url = std::env::var("PUBLIC_URL").ok();
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let dev_mode = parse_bool_env("JWT_DEV_MODE")?;
        let trust_proxy_auth = parse_bool_env("TRUST_PROXY_AUTH")?;

        let auth = AuthConfig {
            auth0_domain: std::env::var("AUTH0_DOMAIN").unwrap_or_default(),
            auth0_audience: std::env::var("AUTH0_AUDIENCE").unwrap_or_default(),
            introspection_client_id: std::env::var("AUTH0_INTROSPECTION_CLIENT_ID").ok(),
            introspection_client_secret: std::env::var("AUTH0_INTROSPECTION_CLIENT_SECRET").ok(),
            hs256_secret: std::env::var("JWT_HS256_SECRET").ok(),
            dev_mode,
            trust_proxy_auth,
            default_tenant_id: std::env::var("DEFAULT_TENANT_ID").ok(),
        };

        let session_ttl_seconds = parse_env_or("SESSION_TTL_SECONDS", DEFAULT_SESSION_TTL_SECONDS)?;
        let rate_limit_window_seconds = parse_env_or("RATE_LIMIT_WINDOW", 60u64)?;
        let rate_limit_max = parse_env_or("RATE_LIMIT_MAX", 60u32)?;
        let rate_limit_burst = parse_env_or("RATE_LIMIT_BURST", 10u32)?;

        Ok(Self {
            host,
            port,
            public_url,
            allowed_origins,
            database_url,
            test_database_url,
            auth,
            session_ttl_seconds,
            rate_limit_window_seconds,
            rate_limit_max,
            rate_limit_burst,
        })
    }

    /// Validates cross-field invariants, accumulating into a single
    /// descriptive error.
    ///
    /// # Errors
    ///
    /// Returns `Err` describing the first invariant violated.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be > 0".to_string());
        }
        if self.database_url.is_empty() {
            return Err("database_url must not be empty".to_string());
        }
        if self.rate_limit_max == 0 {
            return Err("rate_limit_max must be > 0".to_string());
        }
        if self.rate_limit_burst == 0 {
            return Err("rate_limit_burst must be > 0".to_string());
        }
        if self.rate_limit_window_seconds == 0 {
            return Err("rate_limit_window_seconds must be > 0".to_string());
        }
        if self.session_ttl_seconds == 0 {
            return Err("session_ttl_seconds must be > 0".to_string());
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        Ok(())
    }

    /// Returns the token-bucket refill rate in tokens/second:
    /// `refillRate = maxRequests / windowSeconds`.
    #[must_use]
    pub fn rate_limit_refill_rate(&self) -> f64 {
        f64::from(self.rate_limit_max) / self.rate_limit_window_seconds as f64
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(key: &str) -> Result<bool, String> {
    match std::env::var(key) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(format!("{key} must be a boolean-like value")),
        },
        Err(_) => Ok(false),
    }
}

//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)
//!
//! The flat variables recognized by the original demo deployment
//! (`PORT`, `BASE_PATH`, `CLIENT_ID`, `CLIENT_SECRET`, `TOKEN_HOST`,
//! `SCOPES`, `SESSION_SECRET`, `PRODUCTION`) are honored as overrides
//! on top of the `CODEGRANT__*` prefixed form.

use serde::Deserialize;
use std::net::IpAddr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public base URL of this service (e.g., "https://rp.example.com")
    ///
    /// The provider redirects back to `{base_path}/callback`, and the
    /// post-logout redirect target is `base_path` itself.
    pub base_path: String,
    /// Production mode. Controls the `Secure` attribute on the session
    /// cookie and is expected behind a TLS-terminating reverse proxy.
    #[serde(default)]
    pub production: bool,
}

impl ServerConfig {
    /// The callback URL registered with the provider
    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.base_path.trim_end_matches('/'))
    }
}

/// OAuth2 provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Confidential client identifier
    pub client_id: String,
    /// Confidential client secret
    pub client_secret: String,
    /// Provider base URL (e.g., "https://auth.example.com")
    ///
    /// Endpoints consumed: `/oauth2/auth`, `/oauth2/token`,
    /// `/oauth2/sessions/logout`.
    pub token_host: String,
    /// Space-delimited scope list (e.g., "openid offline")
    pub scopes: String,
    /// Timeout for the outbound code-for-token exchange
    #[serde(default = "default_exchange_timeout_seconds")]
    pub exchange_timeout_seconds: u64,
    /// Respond to `/callback` with the token JSON body instead of
    /// redirecting to `/` (the raw-API variant, for non-browser testing)
    #[serde(default)]
    pub raw_callback_response: bool,
}

fn default_exchange_timeout_seconds() -> u64 {
    10
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie signing secret (32+ bytes)
    pub secret: String,
    /// Session time-to-live in seconds (default: 86400 = 24h)
    #[serde(default = "default_session_max_age")]
    pub max_age_seconds: i64,
    /// Session cookie name
    #[serde(default = "default_session_cookie_name")]
    pub cookie_name: String,
}

fn default_session_max_age() -> i64 {
    86_400
}

fn default_session_cookie_name() -> String {
    "session".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CODEGRANT_*)
    /// 5. Flat legacy environment variables (PORT, CLIENT_ID, ...)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_path", "http://localhost:8080")?
            .set_default("server.production", false)?
            .set_default("oauth.scopes", "openid")?
            .set_default("oauth.exchange_timeout_seconds", 10)?
            .set_default("oauth.raw_callback_response", false)?
            .set_default("session.max_age_seconds", 86_400)?
            .set_default("session.cookie_name", "session")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (CODEGRANT_*)
            .add_source(
                Environment::with_prefix("CODEGRANT")
                    .separator("__")
                    .try_parsing(true),
            );

        // Flat variables from the original deployment override everything.
        for (key, var) in [
            ("server.port", "PORT"),
            ("server.base_path", "BASE_PATH"),
            ("oauth.client_id", "CLIENT_ID"),
            ("oauth.client_secret", "CLIENT_SECRET"),
            ("oauth.token_host", "TOKEN_HOST"),
            ("oauth.scopes", "SCOPES"),
            ("session.secret", "SESSION_SECRET"),
        ] {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }
        if let Ok(value) = std::env::var("PRODUCTION") {
            let enabled = value == "1" || value.eq_ignore_ascii_case("true");
            builder = builder.set_override("server.production", enabled)?;
        }

        let config = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.production
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.session.secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.max_age_seconds <= 0 {
            return Err(crate::error::AppError::Config(
                "session.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        if self.oauth.exchange_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "oauth.exchange_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.oauth.client_id.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "oauth.client_id must not be empty".to_string(),
            ));
        }

        let base = url::Url::parse(&self.server.base_path).map_err(|e| {
            crate::error::AppError::Config(format!("server.base_path is not a valid URL: {e}"))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(crate::error::AppError::Config(
                "server.base_path must be an http(s) URL".to_string(),
            ));
        }

        url::Url::parse(&self.oauth.token_host).map_err(|e| {
            crate::error::AppError::Config(format!("oauth.token_host is not a valid URL: {e}"))
        })?;

        if self.server.production && base.scheme() != "https" {
            return Err(crate::error::AppError::Config(
                "server.base_path must be https in production mode".to_string(),
            ));
        }

        if !self.server.production && !is_local_host(base.host_str().unwrap_or_default()) {
            tracing::warn!(
                base_path = %self.server.base_path,
                "Using insecure session cookies for a non-local base_path outside production mode"
            );
        }

        Ok(())
    }
}

fn is_local_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

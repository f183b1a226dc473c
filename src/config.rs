//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (GATEKEEPER__*)
//! 4. Plain environment variables (PORT, GITHUB_CLIENT_ID, ...)

use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

use crate::error::AppError;

/// Path of the OAuth callback route, relative to the public URL.
pub const CALLBACK_PATH: &str = "/auth/github/callback";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (default: 5000)
    pub port: u16,
    /// Externally visible base URL (e.g., "https://gate.example.com").
    /// Falls back to `http://localhost:{port}` when unset.
    pub public_url: Option<String>,
    /// Directory served for paths no route matches
    pub static_dir: PathBuf,
}

impl ServerConfig {
    /// Get the base URL for the server, without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Get the OAuth callback URL registered with the identity provider
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.base_url(), CALLBACK_PATH)
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session signing secret (32+ bytes)
    pub session_secret: String,
    /// Session inactivity timeout in seconds (default: 86400 = 1 day)
    pub session_max_age: i64,
    /// Lifetime of a pending OAuth handshake in seconds (default: 600)
    pub handshake_max_age: i64,
    /// Name of the session cookie
    pub cookie_name: String,
    /// Interval between expired-session sweeps, in seconds
    pub sweep_interval_seconds: u64,
    pub github: GitHubOAuthConfig,
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Requested scopes (default: ["user"])
    pub scope: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    /// REST API base (profile and email lookups)
    pub api_url: String,
    /// Timeout for each request to GitHub
    pub timeout_seconds: u64,
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
    /// 4. Environment variables (GATEKEEPER__SECTION__KEY)
    /// 5. PORT, PUBLIC_URL, GITHUB_CLIENT_ID, GITHUB_CLIENT_SECRET, SESSION_SECRET
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let plain = |key: &str| std::env::var(key).ok().filter(|value| !value.is_empty());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("server.static_dir", "public")?
            .set_default("auth.session_max_age", 86400)?
            .set_default("auth.handshake_max_age", 600)?
            .set_default("auth.cookie_name", "session")?
            .set_default("auth.sweep_interval_seconds", 60)?
            .set_default("auth.github.scope", vec!["user"])?
            .set_default(
                "auth.github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "auth.github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("auth.github.api_url", "https://api.github.com")?
            .set_default("auth.github.timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (GATEKEEPER__*)
            .add_source(
                Environment::with_prefix("GATEKEEPER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain variables win, matching the usual deployment contract
            .set_override_option("server.port", plain("PORT"))?
            .set_override_option("server.public_url", plain("PUBLIC_URL"))?
            .set_override_option("auth.session_secret", plain("SESSION_SECRET"))?
            .set_override_option("auth.github.client_id", plain("GITHUB_CLIENT_ID"))?
            .set_override_option("auth.github.client_secret", plain("GITHUB_CLIENT_SECRET"))?
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Whether session cookies must carry the `Secure` attribute
    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.base_url().starts_with("https://")
    }

    /// Check invariants that deserialization alone cannot express
    pub fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.handshake_max_age <= 0 {
            return Err(AppError::Config(
                "auth.handshake_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.cookie_name.trim().is_empty() {
            return Err(AppError::Config(
                "auth.cookie_name must not be empty".to_string(),
            ));
        }

        if self.auth.github.client_id.trim().is_empty()
            || self.auth.github.client_secret.trim().is_empty()
        {
            return Err(AppError::Config(
                "auth.github.client_id and auth.github.client_secret are required".to_string(),
            ));
        }

        let base_url = self.server.base_url();
        match Url::parse(&base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => {
                return Err(AppError::Config(format!(
                    "server.public_url must be an absolute http(s) URL, got {base_url:?}"
                )));
            }
        }

        for (key, value) in [
            ("auth.github.authorize_url", &self.auth.github.authorize_url),
            ("auth.github.token_url", &self.auth.github.token_url),
            ("auth.github.api_url", &self.auth.github.api_url),
        ] {
            Url::parse(value)
                .map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
        }

        Ok(())
    }
}

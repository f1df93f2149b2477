//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "login.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://login.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// Developer strategy (form-based, for local use)
    #[serde(default)]
    pub developer: DeveloperProviderConfig,
    /// GitHub strategy; disabled when absent
    #[serde(default)]
    pub github: Option<GitHubOAuthConfig>,
}

/// Developer strategy configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeveloperProviderConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_github_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_github_token_url")]
    pub token_url: String,
    /// Base URL of the REST API (the user is fetched from `{api_url}/user`)
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    #[serde(default = "default_github_scope")]
    pub scope: String,
}

fn default_github_authorize_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

fn default_github_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_scope() -> String {
    "read:user user:email".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        format!("omnilogin={},tower_http=debug", self.level.trim())
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (OMNILOGIN__*)
    ///
    /// Call [`AppConfig::validate`] once logging is up.
    ///
    /// # Errors
    /// Returns error if a source cannot be read or deserialized
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/omnilogin.db")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.developer.enabled", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("OMNILOGIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    /// URL the provider redirects back to after the handshake.
    pub fn callback_url(&self, provider: &str) -> String {
        format!("{}/auth/{}/callback", self.server.base_url(), provider)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if let Some(github) = &self.auth.github {
            if github.client_id.trim().is_empty() || github.client_secret.trim().is_empty() {
                return Err(crate::error::AppError::Config(
                    "auth.github.client_id and auth.github.client_secret must not be empty"
                        .to_string(),
                ));
            }
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

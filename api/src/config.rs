//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use shared::settings::{ConnectionSettings, DEFAULT_DATABASE, DEFAULT_HOST};
use shared::time::normalize_timezone_str;
use std::net::SocketAddr;

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `TIDELENS_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `TIDELENS_PORT`: The port to listen on (default: 8080)
///
/// plus the database connection described by [`BackendConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Database connection.
    pub backend: BackendConfig,
}

/// Database connection configuration.
///
/// - `TIDELENS_DB_URL`: database HTTP endpoint (default: `http://localhost:4000`)
/// - `TIDELENS_DB_NAME`: database name (default: `public`)
/// - `TIDELENS_DB_USER` / `TIDELENS_DB_PASSWORD`: basic auth credentials
/// - `TIDELENS_TIMEZONE`: session timezone (default: `UTC`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Database HTTP endpoint.
    pub url: String,
    /// Database name.
    pub database: String,
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Canonical timezone.
    pub timezone: String,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `TIDELENS_PORT` is set but cannot be parsed as a valid port number
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("TIDELENS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("TIDELENS_PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("TIDELENS_PORT must be a valid port number")?
            .unwrap_or(8080);

        Ok(Self {
            host,
            port,
            backend: BackendConfig::from_env(),
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            backend: BackendConfig::default(),
        }
    }
}

impl BackendConfig {
    /// Reads the database connection from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        Self {
            url: var("TIDELENS_DB_URL", DEFAULT_HOST),
            database: var("TIDELENS_DB_NAME", DEFAULT_DATABASE),
            username: var("TIDELENS_DB_USER", ""),
            password: var("TIDELENS_DB_PASSWORD", ""),
            timezone: normalize_timezone_str(&var("TIDELENS_TIMEZONE", "UTC")),
        }
    }

    /// Connection settings for the database client.
    #[must_use]
    pub fn to_settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(self.url.clone())
            .with_database(self.database.clone())
            .with_credentials(self.username.clone(), self.password.clone())
            .with_timezone(self.timezone.clone())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HOST.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            username: String::new(),
            password: String::new(),
            timezone: "UTC".to_string(),
        }
    }
}

//! Configuration module for rss2db.

use serde::Deserialize;
use std::path::Path;

use crate::rss::fetcher::validate_url;
use crate::{IngestError, Result};

/// Environment variable that overrides the database password.
pub const DATABASE_PASSWORD_ENV: &str = "RSS2DB_DATABASE_PASSWORD";

/// Feed source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// URL of the RSS feed to ingest.
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with the request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_feed_url() -> String {
    "https://alexablockchain.com/feed/".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    format!("rss2db/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Database configuration.
///
/// Host, port, name and credentials are used by the PostgreSQL backend;
/// `path` is used by the SQLite backend.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database server host.
    #[serde(default = "default_db_host")]
    pub host: String,
    /// Database server port.
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Database name.
    #[serde(default = "default_db_name")]
    pub name: String,
    /// Login user.
    #[serde(default = "default_db_username")]
    pub username: String,
    /// Login password.
    #[serde(default = "default_db_password")]
    pub password: String,
    /// Maximum pool size.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "rssdb".to_string()
}

fn default_db_username() -> String {
    "postgres".to_string()
}

fn default_db_password() -> String {
    "yourpassword".to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_db_path() -> String {
    "data/rss2db.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            username: default_db_username(),
            password: default_db_password(),
            max_connections: default_db_max_connections(),
            path: default_db_path(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"***")
            .field("max_connections", &self.max_connections)
            .field("path", &self.path)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/rss2db.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Process behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Wait for the operator to press Enter before exiting.
    #[serde(default = "default_pause_on_exit")]
    pub pause_on_exit: bool,
}

fn default_pause_on_exit() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pause_on_exit: default_pause_on_exit(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Feed source configuration.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Process behaviour.
    #[serde(default)]
    pub app: AppConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(IngestError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| IngestError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `RSS2DB_DATABASE_PASSWORD`: Override the database password
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(DATABASE_PASSWORD_ENV) {
            if !password.is_empty() {
                self.database.password = password;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The feed URL is not an http(s) URL with a host
    /// - The pool size is zero
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.feed.url)
            .map_err(|e| IngestError::Validation(format!("feed.url: {e}")))?;

        if self.database.max_connections == 0 {
            return Err(IngestError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

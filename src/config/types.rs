//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::auth::AuthConfig;
use super::delivery::DeliveryConfig;
use super::limits::LimitsConfig;
use super::listen::ListenConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server identity and metrics endpoint.
    #[serde(default)]
    pub server: ServerConfig,
    /// WebSocket listener.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Frame size, timeout and queue limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Session token verification.
    #[serde(default)]
    pub auth: AuthConfig,
    /// SQLite database location.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Chat routing policies.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name, used in logs and the health endpoint.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            metrics_port: None,
        }
    }
}

fn default_server_name() -> String {
    "forumd".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (`:memory:` for an ephemeral database).
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "forum.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistFailurePolicy;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").expect("empty config parses");
        assert_eq!(config.server.name, "forumd");
        assert_eq!(config.database.path, "forum.db");
        assert_eq!(config.limits.max_frame_bytes, 1024);
        assert_eq!(config.listen.path, "/ws");
        assert_eq!(config.delivery.persist_failure, PersistFailurePolicy::Silent);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
[server]
name = "forum.test"
metrics_port = 0

[listen]
address = "127.0.0.1:9001"
path = "/chat"

[limits]
idle_timeout_secs = 5
heartbeat_secs = 2

[auth]
secret = "0123456789abcdef0123456789abcdef"

[database]
path = ":memory:"

[delivery]
persist_failure = "nack"
echo_to_sender = false
"#,
        )
        .expect("config parses");

        assert_eq!(config.server.name, "forum.test");
        assert_eq!(config.server.metrics_port, Some(0));
        assert_eq!(config.listen.address.port(), 9001);
        assert_eq!(config.listen.path, "/chat");
        assert_eq!(config.limits.idle_timeout_secs, 5);
        assert_eq!(config.limits.heartbeat_secs, 2);
        assert_eq!(config.limits.max_frame_bytes, 1024);
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.delivery.persist_failure, PersistFailurePolicy::Nack);
        assert!(!config.delivery.echo_to_sender);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = Config::parse("[delivery]\npersist_failure = \"retry\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

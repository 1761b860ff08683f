//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

const MIN_SECRET_LEN: usize = 32;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("listen.path must start with '/', got '{0}'")]
    InvalidListenPath(String),
    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),
    #[error("limits.heartbeat_secs ({heartbeat}) must be shorter than limits.idle_timeout_secs ({idle})")]
    HeartbeatTooSlow { heartbeat: u64, idle: u64 },
    #[error("limits.transport_frame_cap ({cap}) must be at least limits.max_frame_bytes ({max})")]
    TransportCapTooSmall { cap: usize, max: usize },
    #[error("auth.secret must be at least 32 bytes, got {0}")]
    WeakSecret(usize),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    if !config.listen.path.starts_with('/') {
        errors.push(ValidationError::InvalidListenPath(config.listen.path.clone()));
    }

    let limits = &config.limits;
    let nonzero = [
        ("max_frame_bytes", limits.max_frame_bytes as u64),
        ("idle_timeout_secs", limits.idle_timeout_secs),
        ("heartbeat_secs", limits.heartbeat_secs),
        ("write_timeout_secs", limits.write_timeout_secs),
        ("mailbox_capacity", limits.mailbox_capacity as u64),
        ("hub_capacity", limits.hub_capacity as u64),
    ];
    for (name, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit(name));
        }
    }

    if limits.heartbeat_secs >= limits.idle_timeout_secs {
        errors.push(ValidationError::HeartbeatTooSlow {
            heartbeat: limits.heartbeat_secs,
            idle: limits.idle_timeout_secs,
        });
    }

    if limits.transport_frame_cap < limits.max_frame_bytes {
        errors.push(ValidationError::TransportCapTooSmall {
            cap: limits.transport_frame_cap,
            max: limits.max_frame_bytes,
        });
    }

    if config.auth.secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::WeakSecret(config.auth.secret.len()));
    }

    let db_path = Path::new(&config.database.path);
    if config.database.path != ":memory:"
        && let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(config.database.path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

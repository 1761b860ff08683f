//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, DatabaseConfig)
//! - [`listen`]: WebSocket listener configuration (ListenConfig)
//! - [`limits`]: Per-connection and hub limits (LimitsConfig)
//! - [`auth`]: Session token configuration (AuthConfig)
//! - [`delivery`]: Routing policies (DeliveryConfig, PersistFailurePolicy)
//! - [`validation`]: Startup checks

mod auth;
mod delivery;
mod limits;
mod listen;
mod types;
pub mod validation;

pub use auth::AuthConfig;
pub use delivery::{DeliveryConfig, PersistFailurePolicy};
pub use limits::LimitsConfig;
pub use listen::ListenConfig;
pub use types::{Config, ConfigError, DatabaseConfig, ServerConfig};

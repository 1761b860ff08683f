//! WebSocket listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// Request path that may be upgraded (default: "/ws").
    #[serde(default = "default_path")]
    pub path: String,
    /// Allowed Origin header values. Empty allows every origin.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            path: default_path(),
            allow_origins: Vec::new(),
        }
    }
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_path() -> String {
    "/ws".to_string()
}

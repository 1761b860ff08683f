//! Connection limits configuration.

use serde::Deserialize;
use std::time::Duration;

/// Per-connection and hub limits.
///
/// These bound the memory and time a single client can consume: frame size,
/// read idle deadline, heartbeat cadence, write deadline and queue depths.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted chat frame in bytes (default: 1024).
    /// Larger frames are ignored and the connection stays open.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Hard transport cap in bytes (default: 65536).
    /// A message above this cap is a transport error and closes the connection.
    #[serde(default = "default_transport_frame_cap")]
    pub transport_frame_cap: usize,
    /// Seconds without any inbound frame before the connection is dropped (default: 60).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds between server pings (default: 30).
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Seconds a single write may take (default: 10).
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    /// Outbound frames queued per connection before it counts as a slow consumer (default: 100).
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Pending hub commands before callers wait (default: 1024).
    #[serde(default = "default_hub_capacity")]
    pub hub_capacity: usize,
}

impl LimitsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            transport_frame_cap: default_transport_frame_cap(),
            idle_timeout_secs: default_idle_timeout_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            mailbox_capacity: default_mailbox_capacity(),
            hub_capacity: default_hub_capacity(),
        }
    }
}

fn default_max_frame_bytes() -> usize {
    1024
}

fn default_transport_frame_cap() -> usize {
    64 * 1024
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_write_timeout_secs() -> u64 {
    10
}

fn default_mailbox_capacity() -> usize {
    100
}

fn default_hub_capacity() -> usize {
    1024
}

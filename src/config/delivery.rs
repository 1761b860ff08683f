//! Chat routing policies.

use serde::Deserialize;

/// What the router does when the message store rejects a chat message.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PersistFailurePolicy {
    /// Drop the message and log it.
    #[default]
    Silent,
    /// Drop the message and send the sender an `error` frame.
    Nack,
}

/// Chat routing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Behaviour on persistence failure (default: silent).
    #[serde(default)]
    pub persist_failure: PersistFailurePolicy,
    /// Deliver every routed message back to the sender's connection (default: true).
    #[serde(default = "default_true")]
    pub echo_to_sender: bool,
    /// Send a newly online client one status frame per user already online (default: true).
    #[serde(default = "default_true")]
    pub presence_snapshot: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            persist_failure: PersistFailurePolicy::default(),
            echo_to_sender: true,
            presence_snapshot: true,
        }
    }
}

fn default_true() -> bool {
    true
}

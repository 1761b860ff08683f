//! Network module.
//!
//! Contains the Gateway (TCP listener + WebSocket upgrade), the handshake
//! checks and the per-connection lifecycle.

mod connection;
mod gateway;
pub mod handshake;

pub use connection::{CLOSE_REPLACED, Connection, ConnectionContext};
pub use gateway::{FALLBACK_DISPLAY_NAME, Gateway};
pub use handshake::HandshakePolicy;

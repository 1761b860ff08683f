//! Live connection state: sessions, the hub and presence.

mod hub;
pub mod presence;
mod session;

pub use hub::{Hub, HubHandle, HubOptions, Registration};
pub use session::{
    CloseCause, CloseSignal, ConnectionHandle, Frame, Identity, Mailbox, SendFailure, UserId,
};

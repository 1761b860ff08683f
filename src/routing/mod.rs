//! Chat routing: wire frames and the message router.

pub mod frames;
mod router;

pub use frames::{ChatFrame, ChatMessage, ChatRequest, ErrorFrame, ServerFrame, StatusFrame};
pub use router::{DeliveryPolicy, RouteOutcome, Router};

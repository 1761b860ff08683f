//! Presence events and their fan-out.
//!
//! Presence is not stored anywhere; it is derived from hub registry
//! transitions. Fresh registration produces an online event, removal of the
//! live connection produces an offline event, and replacement produces none.

use super::{ConnectionHandle, Frame, Identity, SendFailure, UserId};
use crate::routing::{ServerFrame, StatusFrame};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub user_id: UserId,
    pub display_name: String,
    pub online: bool,
    pub time: DateTime<Utc>,
}

impl PresenceEvent {
    pub fn online(identity: &Identity) -> Self {
        Self::new(identity, true)
    }

    pub fn offline(identity: &Identity) -> Self {
        Self::new(identity, false)
    }

    fn new(identity: &Identity, online: bool) -> Self {
        Self {
            user_id: identity.user_id,
            display_name: identity.display_name.clone(),
            online,
            time: Utc::now(),
        }
    }

    pub fn to_frame(&self) -> Frame {
        ServerFrame::Status(StatusFrame {
            user_id: self.user_id,
            nickname: self.display_name.clone(),
            online: self.online,
            time: self.time,
        })
        .encode()
    }
}

/// Result of offering one frame to many connections.
#[derive(Debug, Default)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: Vec<(ConnectionHandle, SendFailure)>,
}

/// Offer `frame` to every recipient without waiting on any of them.
pub fn fan_out<'a>(
    recipients: impl IntoIterator<Item = &'a ConnectionHandle>,
    frame: &Frame,
) -> FanOut {
    let mut out = FanOut::default();
    for handle in recipients {
        match handle.try_send(frame.clone()) {
            Ok(()) => out.delivered += 1,
            Err(failure) => out.failed.push((handle.clone(), failure)),
        }
    }
    out
}

/// Online events for everyone already connected, addressed to a newcomer.
pub fn snapshot<'a>(online: impl IntoIterator<Item = &'a Identity>) -> Vec<Frame> {
    online
        .into_iter()
        .map(|identity| PresenceEvent::online(identity).to_frame())
        .collect()
}

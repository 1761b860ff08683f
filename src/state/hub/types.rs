use crate::state::{ConnectionHandle, Frame, Identity, UserId};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Outcome of [`HubHandle::register`](super::HubHandle::register).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The user was offline; an online event was published.
    Fresh,
    /// An older connection for the user was closed and replaced.
    Replaced,
    /// The hub has shut down. The caller should close its connection.
    Closed,
}

/// Hub construction options.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Command queue depth.
    pub capacity: usize,
    /// Send a newcomer one status frame per already-online user.
    pub presence_snapshot: bool,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            capacity: 1024,
            presence_snapshot: true,
        }
    }
}

/// Commands processed sequentially by the hub task.
#[derive(Debug)]
pub(super) enum HubCommand {
    Register {
        identity: Identity,
        handle: ConnectionHandle,
        reply_tx: oneshot::Sender<Registration>,
    },
    /// Remove the entry only if it still belongs to `conn_id`.
    Unregister {
        user_id: UserId,
        conn_id: Uuid,
        reply_tx: oneshot::Sender<bool>,
    },
    Lookup {
        user_id: UserId,
        reply_tx: oneshot::Sender<Option<ConnectionHandle>>,
    },
    Deliver {
        user_id: UserId,
        frame: Frame,
        reply_tx: oneshot::Sender<bool>,
    },
    Broadcast {
        frame: Frame,
        reply_tx: oneshot::Sender<usize>,
    },
    Online {
        reply_tx: oneshot::Sender<Vec<Identity>>,
    },
    Len {
        reply_tx: oneshot::Sender<usize>,
    },
    Shutdown {
        reply_tx: oneshot::Sender<()>,
    },
}

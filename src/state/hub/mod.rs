//! Connection hub.
//!
//! The hub is the single authority over which connection currently belongs
//! to which user. It runs as one Tokio task and owns its registry outright,
//! so registration, replacement, removal and fan-out never race each other.
//!
//! # Rules
//!
//! - At most one live connection per user. A newer registration closes the
//!   older connection and takes its place without presence churn.
//! - Removal is keyed by connection id, so a late teardown from a replaced
//!   connection cannot evict its successor.
//! - Every send into a connection mailbox is non-blocking. A full mailbox
//!   closes that connection; the hub never waits on a client.

use super::presence::{self, FanOut, PresenceEvent};
use super::{CloseCause, ConnectionHandle, Frame, Identity, SendFailure, UserId};
use crate::metrics;
use std::collections::HashMap;
use std::ops::ControlFlow;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

mod types;

use types::HubCommand;
pub use types::{HubOptions, Registration};

struct Entry {
    identity: Identity,
    handle: ConnectionHandle,
}

/// The hub task state.
pub struct Hub {
    entries: HashMap<UserId, Entry>,
    presence_snapshot: bool,
}

impl Hub {
    /// Spawn the hub task and return a handle to it.
    pub fn spawn(options: HubOptions) -> HubHandle {
        let (tx, rx) = mpsc::channel(options.capacity.max(1));
        let hub = Self {
            entries: HashMap::new(),
            presence_snapshot: options.presence_snapshot,
        };

        tokio::spawn(async move {
            hub.run(rx).await;
        });

        HubHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        while let Some(command) = rx.recv().await {
            if self.handle_command(command).is_break() {
                break;
            }
        }
        // Handles dropped here; every mailbox sees closure.
        self.close_all();
        debug!("hub stopped");
    }

    fn handle_command(&mut self, command: HubCommand) -> ControlFlow<()> {
        match command {
            HubCommand::Register {
                identity,
                handle,
                reply_tx,
            } => {
                let outcome = self.register(identity, handle);
                let _ = reply_tx.send(outcome);
            }
            HubCommand::Unregister {
                user_id,
                conn_id,
                reply_tx,
            } => {
                let removed = self.unregister(user_id, conn_id);
                let _ = reply_tx.send(removed);
            }
            HubCommand::Lookup { user_id, reply_tx } => {
                let handle = self.entries.get(&user_id).map(|e| e.handle.clone());
                let _ = reply_tx.send(handle);
            }
            HubCommand::Deliver {
                user_id,
                frame,
                reply_tx,
            } => {
                let delivered = self.deliver(user_id, frame);
                let _ = reply_tx.send(delivered);
            }
            HubCommand::Broadcast { frame, reply_tx } => {
                let out = presence::fan_out(self.entries.values().map(|e| &e.handle), &frame);
                let delivered = self.settle(out);
                let _ = reply_tx.send(delivered);
            }
            HubCommand::Online { reply_tx } => {
                let online = self.entries.values().map(|e| e.identity.clone()).collect();
                let _ = reply_tx.send(online);
            }
            HubCommand::Len { reply_tx } => {
                let _ = reply_tx.send(self.entries.len());
            }
            HubCommand::Shutdown { reply_tx } => {
                self.close_all();
                let _ = reply_tx.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn register(&mut self, identity: Identity, handle: ConnectionHandle) -> Registration {
        let user_id = identity.user_id;

        // A new tab needs to know who is online whether or not it replaces an old one.
        if self.presence_snapshot {
            self.send_snapshot(user_id, &handle);
        }

        if let Some(previous) = self.entries.get_mut(&user_id) {
            info!(
                user_id,
                old_conn = %previous.handle.conn_id(),
                new_conn = %handle.conn_id(),
                "connection replaced"
            );
            previous.handle.close(CloseCause::Replaced);
            previous.handle = handle;
            previous.identity = identity;
            return Registration::Replaced;
        }

        self.entries.insert(
            user_id,
            Entry {
                identity: identity.clone(),
                handle,
            },
        );
        metrics::set_connected_users(self.entries.len());
        info!(user_id, name = %identity.display_name, "user online");

        self.announce(PresenceEvent::online(&identity));
        Registration::Fresh
    }

    fn send_snapshot(&self, user_id: UserId, handle: &ConnectionHandle) {
        let others = self
            .entries
            .values()
            .map(|e| &e.identity)
            .filter(|identity| identity.user_id != user_id);
        for frame in presence::snapshot(others) {
            if handle.try_send(frame).is_err() {
                // A mailbox that cannot hold the snapshot will not keep up either.
                handle.close(CloseCause::SlowConsumer);
                metrics::record_dropped("slow_consumer");
                return;
            }
        }
    }

    fn unregister(&mut self, user_id: UserId, conn_id: Uuid) -> bool {
        let owned = self
            .entries
            .get(&user_id)
            .is_some_and(|e| e.handle.conn_id() == conn_id);
        if !owned {
            debug!(user_id, %conn_id, "stale unregister ignored");
            return false;
        }

        let Some(entry) = self.entries.remove(&user_id) else {
            return false;
        };
        metrics::set_connected_users(self.entries.len());
        info!(user_id, "user offline");

        self.announce(PresenceEvent::offline(&entry.identity));
        true
    }

    fn deliver(&self, user_id: UserId, frame: Frame) -> bool {
        let Some(entry) = self.entries.get(&user_id) else {
            return false;
        };
        match entry.handle.try_send(frame) {
            Ok(()) => true,
            Err(failure) => {
                self.drop_recipient(&entry.handle, failure);
                false
            }
        }
    }

    /// Publish a presence event to every registered connection.
    fn announce(&self, event: PresenceEvent) {
        metrics::record_presence(event.online);
        let frame = event.to_frame();
        let out = presence::fan_out(self.entries.values().map(|e| &e.handle), &frame);
        metrics::record_presence_fanout(out.delivered);
        self.settle(out);
    }

    fn settle(&self, out: FanOut) -> usize {
        for (handle, failure) in &out.failed {
            self.drop_recipient(handle, *failure);
        }
        out.delivered
    }

    fn drop_recipient(&self, handle: &ConnectionHandle, failure: SendFailure) {
        match failure {
            SendFailure::Full => {
                if handle.close(CloseCause::SlowConsumer) {
                    warn!(conn_id = %handle.conn_id(), "mailbox full, closing slow consumer");
                }
                metrics::record_dropped("slow_consumer");
            }
            SendFailure::Closed => {
                // Already tearing down; its unregister is on the way.
                metrics::record_dropped("closed");
            }
        }
    }

    fn close_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.handle.close(CloseCause::Shutdown);
        }
        metrics::set_connected_users(0);
    }
}

/// Cloneable client for the hub task.
///
/// Every method degrades to a neutral answer once the hub has stopped.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(make(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Make `handle` the live connection for `identity.user_id`.
    pub async fn register(&self, identity: Identity, handle: ConnectionHandle) -> Registration {
        self.request(|reply_tx| HubCommand::Register {
            identity,
            handle,
            reply_tx,
        })
        .await
        .unwrap_or(Registration::Closed)
    }

    /// Remove the user's entry if it is still `conn_id`.
    pub async fn unregister(&self, user_id: UserId, conn_id: Uuid) -> bool {
        self.request(|reply_tx| HubCommand::Unregister {
            user_id,
            conn_id,
            reply_tx,
        })
        .await
        .unwrap_or(false)
    }

    pub async fn lookup(&self, user_id: UserId) -> Option<ConnectionHandle> {
        self.request(|reply_tx| HubCommand::Lookup { user_id, reply_tx })
            .await
            .flatten()
    }

    /// Enqueue a frame for one user. `false` if offline or not accepted.
    pub async fn deliver(&self, user_id: UserId, frame: Frame) -> bool {
        self.request(|reply_tx| HubCommand::Deliver {
            user_id,
            frame,
            reply_tx,
        })
        .await
        .unwrap_or(false)
    }

    /// Enqueue a frame for every connected user. Returns how many accepted it.
    pub async fn broadcast(&self, frame: Frame) -> usize {
        self.request(|reply_tx| HubCommand::Broadcast { frame, reply_tx })
            .await
            .unwrap_or(0)
    }

    pub async fn online(&self) -> Vec<Identity> {
        self.request(|reply_tx| HubCommand::Online { reply_tx })
            .await
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.request(|reply_tx| HubCommand::Len { reply_tx })
            .await
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close every connection and stop the hub.
    pub async fn shutdown(&self) {
        let _ = self
            .request(|reply_tx| HubCommand::Shutdown { reply_tx })
            .await;
    }
}

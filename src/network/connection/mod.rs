//! Connection - drives one upgraded WebSocket for its whole life.
//!
//! Each connection runs two tasks that share a bounded mailbox:
//!
//! ```text
//!   client ──▶ [inbound]  ── route ──▶ Router ──▶ Hub ──┐
//!                                                       │ try_send
//!   client ◀── [outbound] ◀── mailbox ◀─────────────────┘
//!                  ▲
//!                  └── heartbeat tick
//! ```
//!
//! Whichever task stops first runs [`Teardown`], which closes the shared
//! signal so the other task stops too, then unregisters from the hub.

mod inbound;
mod outbound;

pub use outbound::CLOSE_REPLACED;

use crate::config::LimitsConfig;
use crate::routing::Router;
use crate::state::{CloseCause, CloseSignal, ConnectionHandle, HubHandle, Identity, Mailbox, Registration, UserId};
use futures_util::StreamExt;
use inbound::Inbound;
use outbound::Outbound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

/// Shared services every connection needs.
#[derive(Clone)]
pub struct ConnectionContext {
    pub hub: HubHandle,
    pub router: Router,
    pub limits: LimitsConfig,
}

/// Idempotent end of a connection, reachable from either task.
pub(crate) struct Teardown {
    hub: HubHandle,
    user_id: UserId,
    conn_id: Uuid,
    signal: CloseSignal,
    done: AtomicBool,
}

impl Teardown {
    fn new(hub: HubHandle, user_id: UserId, conn_id: Uuid, signal: CloseSignal) -> Self {
        Self {
            hub,
            user_id,
            conn_id,
            signal,
            done: AtomicBool::new(false),
        }
    }

    pub(crate) fn signal(&self) -> &CloseSignal {
        &self.signal
    }

    /// Stop both tasks and leave the hub. Only the first call unregisters.
    pub(crate) async fn run(&self, cause: CloseCause) {
        if self.signal.close(cause) {
            debug!(%cause, "closing connection");
        }
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hub.unregister(self.user_id, self.conn_id).await;
    }
}

/// One authenticated WebSocket connection.
pub struct Connection<S> {
    ws: WebSocketStream<S>,
    identity: Identity,
    handle: ConnectionHandle,
    mailbox: Mailbox,
    ctx: ConnectionContext,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(ws: WebSocketStream<S>, identity: Identity, ctx: ConnectionContext) -> Self {
        let (handle, mailbox) = ConnectionHandle::new(ctx.limits.mailbox_capacity);
        Self {
            ws,
            identity,
            handle,
            mailbox,
            ctx,
        }
    }

    pub fn conn_id(&self) -> Uuid {
        self.handle.conn_id()
    }

    /// Register with the hub, run both halves to completion and return why
    /// the connection ended.
    pub async fn run(self) -> CloseCause {
        let Self {
            ws,
            identity,
            handle,
            mailbox,
            ctx,
        } = self;
        let user_id = identity.user_id;
        let conn_id = handle.conn_id();

        let teardown = Arc::new(Teardown::new(
            ctx.hub.clone(),
            user_id,
            conn_id,
            mailbox.signal.clone(),
        ));

        match ctx.hub.register(identity.clone(), handle).await {
            Registration::Fresh => info!(user_id, "connection registered"),
            Registration::Replaced => info!(user_id, "connection replaced an older session"),
            Registration::Closed => {
                warn!(user_id, "hub is closed, refusing connection");
                teardown.signal().close(CloseCause::Shutdown);
            }
        }

        let (sink, stream) = ws.split();

        let inbound = Inbound {
            identity,
            router: ctx.router.clone(),
            max_frame_bytes: ctx.limits.max_frame_bytes,
            idle_timeout: ctx.limits.idle_timeout(),
        };
        let outbound = Outbound {
            heartbeat: ctx.limits.heartbeat(),
            write_timeout: ctx.limits.write_timeout(),
        };

        let reader = tokio::spawn(inbound.run(stream, teardown.clone()).in_current_span());
        let writer = tokio::spawn(
            outbound
                .run(sink, mailbox, teardown.clone())
                .in_current_span(),
        );

        let (reader, writer) = tokio::join!(reader, writer);
        for result in [reader, writer] {
            if let Err(e) = result {
                warn!(error = %e, "connection task failed");
            }
        }

        // Covers a task that panicked before reaching its own teardown.
        teardown.run(CloseCause::TransportError).await;

        let cause = teardown
            .signal()
            .cause()
            .unwrap_or(CloseCause::TransportError);
        info!(user_id, %cause, "connection closed");
        cause
    }
}

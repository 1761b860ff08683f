//! Per-connection session types shared by the hub and the connection tasks.
//!
//! A connection is split into two halves when it is created:
//!
//! - [`ConnectionHandle`] is what the hub stores. It can enqueue frames and
//!   request the connection close.
//! - [`Mailbox`] is what the connection's outbound task owns. It drains the
//!   queue and observes the close request.
//!
//! Once the hub drops its handle the mailbox reports closure, which the
//! outbound task treats as a shutdown.

use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Positive integer assigned by the account store.
pub type UserId = i64;

/// An encoded outbound frame. Cheap to clone across many mailboxes.
pub type Frame = Arc<str>;

/// Who a connection belongs to, fixed at upgrade time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

/// Why a connection was asked to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// A newer connection for the same user took over.
    Replaced,
    /// The mailbox was full.
    SlowConsumer,
    /// Server shutdown.
    Shutdown,
    /// No inbound frame within the idle timeout.
    IdleTimeout,
    /// The peer sent a Close frame or the stream ended.
    PeerClosed,
    /// A read or write failed.
    TransportError,
}

impl CloseCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::SlowConsumer => "slow_consumer",
            Self::Shutdown => "shutdown",
            Self::IdleTimeout => "idle_timeout",
            Self::PeerClosed => "peer_closed",
            Self::TransportError => "transport_error",
        }
    }
}

impl std::fmt::Display for CloseCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a frame could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Mailbox at capacity.
    Full,
    /// The connection is closing or gone.
    Closed,
}

/// One-shot close request shared by both halves of a connection.
///
/// The first cause recorded wins; later requests are no-ops.
#[derive(Debug, Clone, Default)]
pub struct CloseSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    cause: OnceLock<CloseCause>,
    token: CancellationToken,
}

impl CloseSignal {
    /// Request close. Returns `true` only for the call that actually closed.
    pub fn close(&self, cause: CloseCause) -> bool {
        let first = self.inner.cause.set(cause).is_ok();
        if first {
            self.inner.token.cancel();
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    pub fn cause(&self) -> Option<CloseCause> {
        self.inner.cause.get().copied()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.inner.token.cancelled().await
    }
}

/// The hub's view of a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: Uuid,
    sender: mpsc::Sender<Frame>,
    signal: CloseSignal,
}

/// The connection's receiving half: queued frames plus the close request.
#[derive(Debug)]
pub struct Mailbox {
    pub conn_id: Uuid,
    pub frames: mpsc::Receiver<Frame>,
    pub signal: CloseSignal,
}

impl ConnectionHandle {
    /// Create a connection with a bounded mailbox of `capacity` frames.
    pub fn new(capacity: usize) -> (Self, Mailbox) {
        let (sender, frames) = mpsc::channel(capacity.max(1));
        let conn_id = Uuid::new_v4();
        let signal = CloseSignal::default();
        let handle = Self {
            conn_id,
            sender,
            signal: signal.clone(),
        };
        let mailbox = Mailbox {
            conn_id,
            frames,
            signal,
        };
        (handle, mailbox)
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Enqueue a frame without waiting.
    pub fn try_send(&self, frame: Frame) -> Result<(), SendFailure> {
        if self.signal.is_closed() {
            return Err(SendFailure::Closed);
        }
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::Full,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    pub fn close(&self, cause: CloseCause) -> bool {
        self.signal.close(cause)
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    pub fn close_cause(&self) -> Option<CloseCause> {
        self.signal.cause()
    }

    pub fn signal(&self) -> &CloseSignal {
        &self.signal
    }
}

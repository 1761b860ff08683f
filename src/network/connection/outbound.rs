//! Outbound half: drain the mailbox, send heartbeats, close politely.

use super::Teardown;
use crate::error::TransportError;
use crate::metrics;
use crate::state::{CloseCause, Mailbox};
use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

/// Close code sent when a newer connection replaced this one.
pub const CLOSE_REPLACED: u16 = 4000;

type Sink<S> = SplitSink<WebSocketStream<S>, Message>;

pub(super) struct Outbound {
    pub heartbeat: Duration,
    pub write_timeout: Duration,
}

impl Outbound {
    pub(super) async fn run<S>(self, mut sink: Sink<S>, mut mailbox: Mailbox, teardown: Arc<Teardown>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut heartbeat = interval_at(Instant::now() + self.heartbeat, self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cause = loop {
            let message = tokio::select! {
                biased;
                _ = mailbox.signal.closed() => {
                    break mailbox.signal.cause().unwrap_or(CloseCause::Shutdown);
                }
                frame = mailbox.frames.recv() => match frame {
                    Some(frame) => Message::Text(frame.to_string()),
                    // The hub dropped our handle.
                    None => break CloseCause::Shutdown,
                },
                _ = heartbeat.tick() => Message::Ping(Vec::new()),
            };

            if let Err(e) = self.send(&mut sink, message).await {
                metrics::record_transport_error(e.error_code());
                debug!(error = %e, "write failed");
                break CloseCause::TransportError;
            }
        };

        teardown.run(cause).await;

        // The first recorded cause decides the close code.
        let cause = mailbox.signal.cause().unwrap_or(cause);
        if cause != CloseCause::TransportError {
            let _ = self.send(&mut sink, Message::Close(Some(close_frame(cause)))).await;
        }
        let _ = timeout(self.write_timeout, sink.close()).await;
    }

    async fn send<S>(&self, sink: &mut Sink<S>, message: Message) -> Result<(), TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match timeout(self.write_timeout, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Write(e)),
            Err(_) => Err(TransportError::WriteTimeout(self.write_timeout)),
        }
    }
}

pub(super) fn close_frame(cause: CloseCause) -> CloseFrame<'static> {
    let code = match cause {
        CloseCause::Replaced => CloseCode::Library(CLOSE_REPLACED),
        CloseCause::Shutdown | CloseCause::IdleTimeout => CloseCode::Away,
        CloseCause::SlowConsumer => CloseCode::Policy,
        CloseCause::PeerClosed | CloseCause::TransportError => CloseCode::Normal,
    };
    CloseFrame {
        code,
        reason: Cow::Borrowed(cause.as_str()),
    }
}

//! Inbound half: read frames, enforce limits, hand chat to the router.

use super::Teardown;
use crate::error::{RouteError, TransportError};
use crate::metrics;
use crate::routing::{Router, frames};
use crate::state::{CloseCause, Identity};
use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

pub(super) struct Inbound {
    pub identity: Identity,
    pub router: Router,
    pub max_frame_bytes: usize,
    pub idle_timeout: Duration,
}

impl Inbound {
    /// Read until the peer leaves, a read fails, the idle deadline passes or
    /// the connection is closed from elsewhere. Always ends in teardown.
    pub(super) async fn run<S>(self, mut stream: SplitStream<WebSocketStream<S>>, teardown: Arc<Teardown>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let cause = loop {
            let next = tokio::select! {
                _ = teardown.signal().closed() => {
                    break teardown.signal().cause().unwrap_or(CloseCause::PeerClosed);
                }
                next = timeout(self.idle_timeout, stream.next()) => next,
            };

            let message = match next {
                Err(_) => {
                    let e = TransportError::IdleTimeout(self.idle_timeout);
                    metrics::record_transport_error(e.error_code());
                    debug!(error = %e, "closing idle connection");
                    break CloseCause::IdleTimeout;
                }
                Ok(None) => break CloseCause::PeerClosed,
                Ok(Some(Err(e))) => {
                    let e = TransportError::Read(e);
                    metrics::record_transport_error(e.error_code());
                    debug!(error = %e, "read failed");
                    break CloseCause::TransportError;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => self.handle_text(&text).await,
                Message::Binary(_) => {
                    metrics::record_protocol_error("unsupported_type");
                    debug!("ignoring binary frame");
                }
                Message::Close(_) => break CloseCause::PeerClosed,
                // Any frame renews the idle deadline; pings are answered by tungstenite.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        };

        teardown.run(cause).await;
    }

    async fn handle_text(&self, text: &str) {
        let request = match frames::decode(text, self.max_frame_bytes) {
            Ok(request) => request,
            Err(e) => {
                metrics::record_protocol_error(e.error_code());
                debug!(error = %e, "ignoring inbound frame");
                return;
            }
        };

        // Persistence failures are logged by the router.
        let message = request.into_message(&self.identity);
        if let Err(RouteError::Invalid(e)) = self.router.route(message).await {
            metrics::record_protocol_error(e.error_code());
            debug!(error = %e, "chat message rejected");
        }
    }
}

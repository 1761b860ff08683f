//! Gateway - TCP listener that upgrades authenticated clients to WebSockets.
//!
//! The Gateway binds the listen socket and spawns one task per accepted
//! stream. Each task runs the WebSocket handshake with the session check in
//! its callback; only a verified request ever becomes a [`Connection`].

use super::connection::{Connection, ConnectionContext};
use super::handshake::{self, HandshakePolicy, Rejection};
use crate::auth::{Claims, SessionVerifier};
use crate::metrics;
use crate::state::Identity;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Name used for users the message store does not know.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

struct Shared {
    policy: HandshakePolicy,
    verifier: Arc<dyn SessionVerifier>,
    ctx: ConnectionContext,
}

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        policy: HandshakePolicy,
        verifier: Arc<dyn SessionVerifier>,
        ctx: ConnectionContext,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, path = %policy.path, "WebSocket listener bound");

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                policy,
                verifier,
                ctx,
            }),
        })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the gateway, accepting connections until the task is dropped.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "TCP connection accepted");
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        serve(stream, addr, shared).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

fn transport_config(cap: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(cap);
    config.max_frame_size = Some(cap);
    config
}

async fn serve(stream: TcpStream, addr: SocketAddr, shared: Arc<Shared>) {
    let _ = stream.set_nodelay(true);
    let limits = &shared.ctx.limits;

    let mut verified: Option<Claims> = None;
    let callback = |request: &Request, response: Response| {
        match handshake::authorize(request, response, &shared.policy, shared.verifier.as_ref()) {
            Ok((response, claims)) => {
                verified = Some(claims);
                Ok(response)
            }
            Err(rejection) => {
                match &rejection {
                    Rejection::Unauthorized(e) => {
                        metrics::record_auth_failure(e.error_code());
                        info!(%addr, error = %e, "WebSocket upgrade refused");
                    }
                    Rejection::OriginNotAllowed(origin) => {
                        warn!(%addr, %origin, "WebSocket origin rejected");
                    }
                    Rejection::NotFound => {
                        debug!(%addr, path = %request.uri().path(), "WebSocket upgrade on unknown path");
                    }
                }
                Err(rejection.into_response())
            }
        }
    };

    let handshake = accept_hdr_async_with_config(
        stream,
        callback,
        Some(transport_config(limits.transport_frame_cap)),
    );
    let ws = match timeout(limits.write_timeout(), handshake).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "WebSocket handshake failed");
            return;
        }
        Err(_) => {
            debug!(%addr, "WebSocket handshake timed out");
            return;
        }
    };
    let Some(claims) = verified else {
        return;
    };

    let identity = Identity {
        user_id: claims.user_id,
        display_name: resolve_display_name(&shared.ctx, claims.user_id).await,
    };
    metrics::record_connection();

    let connection = Connection::new(ws, identity, shared.ctx.clone());
    let span = info_span!(
        "connection",
        conn_id = %connection.conn_id(),
        %addr,
        user_id = claims.user_id
    );
    connection.run().instrument(span).await;
}

async fn resolve_display_name(ctx: &ConnectionContext, user_id: i64) -> String {
    match ctx.router.store().display_name(user_id).await {
        Ok(Some(name)) => name,
        Ok(None) => FALLBACK_DISPLAY_NAME.to_string(),
        Err(e) => {
            warn!(user_id, error = %e, "display name lookup failed");
            FALLBACK_DISPLAY_NAME.to_string()
        }
    }
}

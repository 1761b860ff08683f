//! Test WebSocket client.
//!
//! Sends chat frames and asserts on received server frames.

use forumd::routing::ServerFrame;
use futures_util::{SinkExt, StreamExt};
use http::header::SEC_WEBSOCKET_PROTOCOL;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test WebSocket client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Subprotocol the server echoed back, if any.
    pub protocol: Option<String>,
}

impl TestClient {
    /// Connect, passing the token in `Sec-WebSocket-Protocol`.
    pub async fn connect_with_subprotocol(url: &str, token: &str) -> anyhow::Result<Self> {
        let mut request = url.into_client_request()?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, token.parse()?);
        Self::open(request).await
    }

    /// Connect, passing the token as the `token` query parameter.
    #[allow(dead_code)]
    pub async fn connect_with_query(url: &str, token: &str) -> anyhow::Result<Self> {
        let request = format!("{url}?token={token}").into_client_request()?;
        Self::open(request).await
    }

    async fn open(
        request: tokio_tungstenite::tungstenite::handshake::client::Request,
    ) -> anyhow::Result<Self> {
        let (ws, response) = connect_async(request).await?;
        let protocol = response
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(Self { ws, protocol })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a chat message.
    pub async fn chat(&mut self, recipient_id: i64, content: &str) -> anyhow::Result<()> {
        let frame = serde_json::json!({
            "type": "chat",
            "content": content,
            "recipientId": recipient_id,
        });
        self.send_raw(&frame.to_string()).await
    }

    /// Receive a single server frame.
    pub async fn recv(&mut self) -> anyhow::Result<ServerFrame> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a server frame with a timeout. Control frames are skipped.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ServerFrame> {
        loop {
            let message = timeout(dur, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => anyhow::bail!("connection closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Receive frames until the predicate matches; returns everything read.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<ServerFrame>>
    where
        F: FnMut(&ServerFrame) -> bool,
    {
        let mut frames = Vec::new();
        loop {
            let frame = self.recv().await?;
            let done = predicate(&frame);
            frames.push(frame);
            if done {
                break;
            }
        }
        Ok(frames)
    }

    /// Read everything that arrives within `dur`.
    #[allow(dead_code)]
    pub async fn drain(&mut self, dur: Duration) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.recv_timeout(dur).await {
            frames.push(frame);
        }
        frames
    }

    /// Wait for the server's Close frame and return its code.
    #[allow(dead_code)]
    pub async fn closed(&mut self) -> anyhow::Result<Option<CloseCode>> {
        loop {
            let message = timeout(Duration::from_secs(5), self.ws.next()).await?;
            match message {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| f.code)),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    /// Close the connection from the client side.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

//! Test server management.
//!
//! Starts forumd in-process on an ephemeral port with an in-memory database.

use forumd::Server;
use forumd::config::{Config, PersistFailurePolicy};
use forumd::state::HubHandle;
use std::time::Duration;
use tokio::time::sleep;

pub const TEST_SECRET: &str = "test-secret-test-secret-test-sec";

/// A test server instance.
pub struct TestServer {
    server: Option<Server>,
}

impl TestServer {
    /// Start a server with the default test configuration.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start a server after letting the caller adjust the configuration.
    pub async fn start_with(adjust: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let mut config = Config::default();
        config.server.name = "test.forum".to_string();
        config.server.metrics_port = Some(0);
        config.listen.address = "127.0.0.1:0".parse()?;
        config.auth.secret = TEST_SECRET.to_string();
        config.database.path = ":memory:".to_string();
        adjust(&mut config);

        let server = Server::start(&config).await?;
        Ok(Self {
            server: Some(server),
        })
    }

    /// Start a server that NACKs messages it fails to persist.
    #[allow(dead_code)]
    pub async fn start_nacking() -> anyhow::Result<Self> {
        Self::start_with(|config| config.delivery.persist_failure = PersistFailurePolicy::Nack)
            .await
    }

    fn inner(&self) -> &Server {
        // Only None after shutdown, which consumes self.
        self.server.as_ref().expect("server running")
    }

    /// WebSocket URL of the upgrade endpoint.
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.inner().local_addr())
    }

    pub fn hub(&self) -> &HubHandle {
        self.inner().hub()
    }

    /// Issue a valid session token for `user_id`.
    pub fn token(&self, user_id: i64) -> String {
        self.inner().verifier().issue(user_id).expect("issue token")
    }

    /// Issue a token as if minted at `issued_at` (unix seconds).
    #[allow(dead_code)]
    pub fn token_issued_at(&self, user_id: i64, issued_at: i64) -> String {
        self.inner()
            .verifier()
            .issue_at(user_id, issued_at)
            .expect("issue token")
    }

    /// Create a forum account and return its id.
    pub async fn create_user(&self, nickname: &str) -> anyhow::Result<i64> {
        let user = self
            .inner()
            .database()
            .users()
            .create(nickname, &format!("{nickname}@forum.test"))
            .await?;
        Ok(user.id)
    }

    /// Number of persisted messages between two users.
    #[allow(dead_code)]
    pub async fn conversation_len(&self, a: i64, b: i64) -> anyhow::Result<usize> {
        let messages = self.inner().database().messages().conversation(a, b, 100).await?;
        Ok(messages.len())
    }

    /// Connect a client for an existing user, authenticating via subprotocol.
    pub async fn connect(&self, user_id: i64) -> anyhow::Result<super::client::TestClient> {
        let client =
            super::client::TestClient::connect_with_subprotocol(&self.url(), &self.token(user_id))
                .await?;
        self.wait_online(user_id).await?;
        Ok(client)
    }

    /// Wait until the hub lists `user_id`.
    pub async fn wait_online(&self, user_id: i64) -> anyhow::Result<()> {
        for _ in 0..50 {
            if self.hub().lookup(user_id).await.is_some() {
                return Ok(());
            }
            sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("user {user_id} never came online")
    }

    /// Wait until the hub no longer lists `user_id`.
    #[allow(dead_code)]
    pub async fn wait_offline(&self, user_id: i64) -> anyhow::Result<()> {
        for _ in 0..50 {
            if self.hub().lookup(user_id).await.is_none() {
                return Ok(());
            }
            sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("user {user_id} never went offline")
    }

    /// Stop the server, closing every connection.
    #[allow(dead_code)]
    pub async fn shutdown(mut self) {
        if let Some(server) = self.server.take() {
            server.shutdown().await;
        }
    }
}

//! Wiring: database, verifier, hub, router and gateway from one [`Config`].

use crate::auth::HmacVerifier;
use crate::config::Config;
use crate::db::{Database, MessageStore};
use crate::network::{ConnectionContext, Gateway, HandshakePolicy};
use crate::routing::{DeliveryPolicy, Router};
use crate::state::{Hub, HubHandle, HubOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// A running real-time server.
pub struct Server {
    addr: SocketAddr,
    hub: HubHandle,
    db: Database,
    verifier: Arc<HmacVerifier>,
    gateway: JoinHandle<anyhow::Result<()>>,
}

impl Server {
    /// Open the database, spawn the hub and start accepting connections.
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let db = Database::new(&config.database.path).await?;
        info!(path = %config.database.path, "Database ready");

        let verifier = Arc::new(HmacVerifier::from_config(&config.auth));

        let hub = Hub::spawn(HubOptions {
            capacity: config.limits.hub_capacity,
            presence_snapshot: config.delivery.presence_snapshot,
        });

        let store: Arc<dyn MessageStore> = Arc::new(db.clone());
        let router = Router::new(store, hub.clone(), DeliveryPolicy::from(&config.delivery));
        let ctx = ConnectionContext {
            hub: hub.clone(),
            router,
            limits: config.limits.clone(),
        };

        let gateway = Gateway::bind(
            config.listen.address,
            HandshakePolicy::from(&config.listen),
            verifier.clone(),
            ctx,
        )
        .await?;
        let addr = gateway.local_addr()?;
        let gateway = tokio::spawn(gateway.run());

        Ok(Self {
            addr,
            hub,
            db,
            verifier,
            gateway,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The verifier, which can also issue tokens.
    pub fn verifier(&self) -> &HmacVerifier {
        &self.verifier
    }

    /// Resolves when the accept loop stops; normally never.
    pub async fn wait(&mut self) -> anyhow::Result<()> {
        match (&mut self.gateway).await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        }
    }

    /// Stop accepting and close every live connection.
    pub async fn shutdown(self) {
        self.gateway.abort();
        self.hub.shutdown().await;
        info!("Server stopped");
    }
}

//! Message router: validate, persist, then deliver.

use super::frames::{ChatMessage, ErrorFrame, ServerFrame};
use crate::config::{DeliveryConfig, PersistFailurePolicy};
use crate::db::MessageStore;
use crate::error::RouteError;
use crate::metrics;
use crate::state::HubHandle;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routing behaviour knobs, taken from `[delivery]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryPolicy {
    pub persist_failure: PersistFailurePolicy,
    pub echo_to_sender: bool,
}

impl From<&DeliveryConfig> for DeliveryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            persist_failure: config.persist_failure,
            echo_to_sender: config.echo_to_sender,
        }
    }
}

/// What happened to a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub message_id: i64,
    pub recipient_delivered: bool,
    pub echoed: bool,
}

/// Routes chat messages from a connection to the store and the hub.
///
/// The router never holds a connection; it reaches recipients only through
/// [`HubHandle::deliver`].
#[derive(Clone)]
pub struct Router {
    store: Arc<dyn MessageStore>,
    hub: HubHandle,
    policy: DeliveryPolicy,
}

impl Router {
    pub fn new(store: Arc<dyn MessageStore>, hub: HubHandle, policy: DeliveryPolicy) -> Self {
        Self { store, hub, policy }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Route one chat message.
    ///
    /// Invalid messages never reach the store. A store failure drops the
    /// message; under [`PersistFailurePolicy::Nack`] the sender is told.
    /// An offline recipient is not an error.
    pub async fn route(&self, message: ChatMessage) -> Result<RouteOutcome, RouteError> {
        message.validate()?;

        let message_id = match self.store.persist(&message).await {
            Ok(id) => id,
            Err(e) => {
                let err = RouteError::Persistence(e);
                warn!(
                    sender_id = message.sender_id,
                    recipient_id = message.recipient_id,
                    error = %err,
                    "failed to persist chat message"
                );
                metrics::record_dropped(err.error_code());
                if self.policy.persist_failure == PersistFailurePolicy::Nack {
                    self.nack(&message).await;
                }
                return Err(err);
            }
        };

        let frame = message.to_frame(message_id).encode();
        let recipient_delivered = self.hub.deliver(message.recipient_id, frame.clone()).await;

        // A note to self is delivered once.
        let echoed = if self.policy.echo_to_sender && message.sender_id != message.recipient_id {
            self.hub.deliver(message.sender_id, frame).await
        } else {
            false
        };

        metrics::record_routed();
        debug!(
            message_id,
            sender_id = message.sender_id,
            recipient_id = message.recipient_id,
            recipient_delivered,
            echoed,
            "chat message routed"
        );

        Ok(RouteOutcome {
            message_id,
            recipient_delivered,
            echoed,
        })
    }

    async fn nack(&self, message: &ChatMessage) {
        let frame = ServerFrame::Error(ErrorFrame {
            code: "delivery_failed".to_string(),
            recipient_id: Some(message.recipient_id),
            content: Some(message.content.clone()),
        })
        .encode();
        self.hub.deliver(message.sender_id, frame).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use crate::error::ProtocolError;
    use crate::state::{ConnectionHandle, Hub, HubOptions, Identity, Mailbox};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records persisted messages; optionally fails every write.
    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<ChatMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageStore for MemoryStore {
        async fn persist(&self, message: &ChatMessage) -> Result<i64, DbError> {
            if self.fail {
                return Err(DbError::Internal("disk full".to_string()));
            }
            let mut saved = self.saved.lock().unwrap();
            saved.push(message.clone());
            Ok(saved.len() as i64)
        }

        async fn display_name(&self, _user_id: i64) -> Result<Option<String>, DbError> {
            Ok(None)
        }
    }

    fn message(sender: i64, recipient: i64, content: &str) -> ChatMessage {
        ChatMessage {
            sender_id: sender,
            sender_name: format!("user{sender}"),
            recipient_id: recipient,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    async fn connect(hub: &HubHandle, id: i64) -> Mailbox {
        let (handle, mut mailbox) = ConnectionHandle::new(16);
        hub.register(
            Identity {
                user_id: id,
                display_name: format!("user{id}"),
            },
            handle,
        )
        .await;
        while mailbox.frames.try_recv().is_ok() {}
        mailbox
    }

    fn quiet_hub() -> HubHandle {
        Hub::spawn(HubOptions {
            presence_snapshot: false,
            ..HubOptions::default()
        })
    }

    fn policy(persist_failure: PersistFailurePolicy) -> DeliveryPolicy {
        DeliveryPolicy {
            persist_failure,
            echo_to_sender: true,
        }
    }

    fn chat_fields(frame: &str) -> (i64, i64, String) {
        match serde_json::from_str::<ServerFrame>(frame).unwrap() {
            ServerFrame::Chat(c) => (c.sender_id, c.recipient_id, c.content),
            other => panic!("expected chat frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delivers_to_recipient_and_echoes_to_sender() {
        let hub = quiet_hub();
        let store = Arc::new(MemoryStore::default());
        let router = Router::new(store.clone(), hub.clone(), policy(PersistFailurePolicy::Silent));
        let mut alice = connect(&hub, 1).await;
        let mut bob = connect(&hub, 2).await;

        let outcome = router.route(message(1, 2, "hi")).await.unwrap();
        assert!(outcome.recipient_delivered);
        assert!(outcome.echoed);

        let to_bob = bob.frames.try_recv().unwrap();
        let to_alice = alice.frames.try_recv().unwrap();
        assert_eq!(chat_fields(&to_bob), (1, 2, "hi".to_string()));
        assert_eq!(to_alice, to_bob);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offline_parties_still_persist() {
        let hub = quiet_hub();
        let store = Arc::new(MemoryStore::default());
        let router = Router::new(store.clone(), hub, policy(PersistFailurePolicy::Silent));

        let outcome = router.route(message(1, 2, "later")).await.unwrap();
        assert!(!outcome.recipient_delivered);
        assert!(!outcome.echoed);
        assert_eq!(store.saved.lock().unwrap()[0].content, "later");
    }

    #[tokio::test]
    async fn invalid_message_never_reaches_store() {
        let hub = quiet_hub();
        let store = Arc::new(MemoryStore::default());
        let router = Router::new(store.clone(), hub, policy(PersistFailurePolicy::Silent));

        let err = router.route(message(1, 2, "")).await.unwrap_err();
        assert!(matches!(err, RouteError::Invalid(ProtocolError::EmptyContent)));
        let err = router.route(message(1, 0, "hi")).await.unwrap_err();
        assert!(matches!(err, RouteError::Invalid(ProtocolError::InvalidRecipient(0))));
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn message_to_self_is_delivered_once() {
        let hub = quiet_hub();
        let store = Arc::new(MemoryStore::default());
        let router = Router::new(store, hub.clone(), policy(PersistFailurePolicy::Silent));
        let mut alice = connect(&hub, 1).await;

        let outcome = router.route(message(1, 1, "memo")).await.unwrap();
        assert!(outcome.recipient_delivered);
        assert!(!outcome.echoed);
        assert!(alice.frames.try_recv().is_ok());
        assert!(alice.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn echo_can_be_disabled() {
        let hub = quiet_hub();
        let store = Arc::new(MemoryStore::default());
        let router = Router::new(
            store,
            hub.clone(),
            DeliveryPolicy {
                persist_failure: PersistFailurePolicy::Silent,
                echo_to_sender: false,
            },
        );
        let mut alice = connect(&hub, 1).await;
        let _bob = connect(&hub, 2).await;

        router.route(message(1, 2, "hi")).await.unwrap();
        assert!(alice.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn persistence_failure_is_silent_by_default() {
        let hub = quiet_hub();
        let store = Arc::new(MemoryStore {
            fail: true,
            ..MemoryStore::default()
        });
        let router = Router::new(store, hub.clone(), policy(PersistFailurePolicy::Silent));
        let mut alice = connect(&hub, 1).await;
        let mut bob = connect(&hub, 2).await;

        let err = router.route(message(1, 2, "hi")).await.unwrap_err();
        assert!(matches!(err, RouteError::Persistence(_)));
        assert!(alice.frames.try_recv().is_err());
        assert!(bob.frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn persistence_failure_nacks_sender() {
        let hub = quiet_hub();
        let store = Arc::new(MemoryStore {
            fail: true,
            ..MemoryStore::default()
        });
        let router = Router::new(store, hub.clone(), policy(PersistFailurePolicy::Nack));
        let mut alice = connect(&hub, 1).await;
        let mut bob = connect(&hub, 2).await;

        router.route(message(1, 2, "hi")).await.unwrap_err();

        let nack = alice.frames.try_recv().unwrap();
        let frame: ServerFrame = serde_json::from_str(&nack).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Error(ErrorFrame {
                code: "delivery_failed".to_string(),
                recipient_id: Some(2),
                content: Some("hi".to_string()),
            })
        );
        assert!(bob.frames.try_recv().is_err());
    }
}

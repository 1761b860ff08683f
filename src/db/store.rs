//! Message store abstraction used by the router and the gateway.

use super::{Database, DbError};
use crate::routing::ChatMessage;
use async_trait::async_trait;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably persist a chat message. Returns the stored message id.
    async fn persist(&self, message: &ChatMessage) -> Result<i64, DbError>;

    /// Resolve a user id to a display name.
    async fn display_name(&self, user_id: i64) -> Result<Option<String>, DbError>;
}

#[async_trait]
impl MessageStore for Database {
    async fn persist(&self, message: &ChatMessage) -> Result<i64, DbError> {
        self.messages()
            .insert(
                message.sender_id,
                message.recipient_id,
                &message.content,
                message.created_at,
            )
            .await
    }

    async fn display_name(&self, user_id: i64) -> Result<Option<String>, DbError> {
        self.users().find_nickname(user_id).await
    }
}

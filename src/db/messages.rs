//! Chat message repository.

use super::DbError;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A persisted direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for chat message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message, returning its row id.
    pub async fn insert(
        &self,
        sender_id: i64,
        recipient_id: i64,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, recipient_id, content, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .bind(created_at)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent messages exchanged between two users, oldest first.
    pub async fn conversation(
        &self,
        a: i64,
        b: i64,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, DbError> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, String, DateTime<Utc>)>(
            r#"
            SELECT id, sender_id, recipient_id, content, created_at
            FROM messages
            WHERE (sender_id = ? AND recipient_id = ?)
               OR (sender_id = ? AND recipient_id = ?)
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let mut messages: Vec<StoredMessage> = rows
            .into_iter()
            .map(
                |(id, sender_id, recipient_id, content, created_at)| StoredMessage {
                    id,
                    sender_id,
                    recipient_id,
                    content,
                    created_at,
                },
            )
            .collect();
        messages.reverse();
        Ok(messages)
    }

    /// Total number of persisted messages.
    pub async fn count(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

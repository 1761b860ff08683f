//! User repository.
//!
//! Accounts are created by the registration endpoint; the real-time layer
//! only reads nicknames. `create` exists for that endpoint and for tests.

use super::DbError;
use sqlx::SqlitePool;

/// A forum user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub created_at: i64,
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user. Fails with [`DbError::UserExists`] on a duplicate nickname or email.
    pub async fn create(&self, nickname: &str, email: &str) -> Result<User, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO users (nickname, email, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(nickname)
        .bind(email)
        .bind(now)
        .execute(self.pool)
        .await;

        match result {
            Ok(done) => Ok(User {
                id: done.last_insert_rowid(),
                nickname: nickname.to_string(),
                email: email.to_string(),
                created_at: now,
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(DbError::UserExists(nickname.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a user id to its nickname.
    pub async fn find_nickname(&self, id: i64) -> Result<Option<String>, DbError> {
        let nickname = sqlx::query_scalar::<_, String>("SELECT nickname FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(nickname)
    }
}

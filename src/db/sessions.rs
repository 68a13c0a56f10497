//! Login session rows

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::error::Result;

use super::users::PublicUser;

/// Session repository
///
/// Sessions are keyed by a digest of the cookie token; the raw token is
/// never stored.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a session for `user_id`
    pub async fn insert(&self, session_id: &str, user_id: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .bind(now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .bind(expires_at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Resolve a live session to its user
    pub async fn find_user(&self, session_id: &str) -> Result<Option<PublicUser>> {
        let now = super::now_timestamp();

        let user = sqlx::query_as::<_, PublicUser>(
            r#"
            SELECT u.id, u.username, u.email
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = ? AND s.expires_at > ?
            "#,
        )
        .bind(session_id)
        .bind(&now)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Delete a session
    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove expired sessions
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = super::now_timestamp();
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(&now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

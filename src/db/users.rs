//! User accounts and login history

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::password;
use crate::error::{is_unique_violation, AppError, Result};

use super::now_timestamp;

/// Full user row, including the password hash
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub registered_at: String,
    pub last_login: String,
    pub ip: Option<String>,
}

/// User fields that may leave the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<UserRecord> for PublicUser {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
        }
    }
}

/// Login history entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoginEvent {
    pub id: i64,
    pub user_id: String,
    pub date: String,
    pub ip: Option<String>,
}

/// User repository
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an account and its first login event
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        ip: &str,
    ) -> Result<PublicUser> {
        if self.username_taken(username).await? {
            return Err(AppError::DuplicateUsername);
        }
        if self.email_taken(email).await? {
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = password::hash(password).await?;
        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password, registered_at, last_login, ip)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .bind(ip)
        .execute(&mut *tx)
        .await
        .map_err(duplicate_from_constraint)?;

        sqlx::query("INSERT INTO login_history (user_id, date, ip) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(&now)
            .bind(ip)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %id, username = %username, "User registered");

        Ok(PublicUser {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    /// Verify credentials and record the login
    ///
    /// Unknown accounts and wrong passwords produce the same error.
    pub async fn login(&self, username_or_email: &str, password: &str, ip: &str) -> Result<PublicUser> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password, registered_at, last_login, ip
            FROM users
            WHERE username = ? OR email = ?
            LIMIT 1
            "#,
        )
        .bind(username_or_email)
        .bind(username_or_email)
        .fetch_optional(self.pool)
        .await?;

        let Some(record) = record else {
            password::verify_decoy(password).await?;
            tracing::debug!("Login attempt for unknown account");
            return Err(AppError::InvalidCredentials);
        };

        if !password::verify(password, &record.password).await? {
            tracing::debug!(user_id = %record.id, "Login attempt with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET last_login = ?, ip = ? WHERE id = ?")
            .bind(&now)
            .bind(ip)
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO login_history (user_id, date, ip) VALUES (?, ?, ?)")
            .bind(&record.id)
            .bind(&now)
            .bind(ip)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %record.id, "User logged in");
        Ok(record.into())
    }

    /// Get a user's public fields
    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<PublicUser>> {
        let user = sqlx::query_as::<_, PublicUser>(
            "SELECT id, username, email FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get the full row for a user
    #[cfg(test)]
    pub async fn get_record(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password, registered_at, last_login, ip
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Login history for a user, newest first
    pub async fn login_history(&self, user_id: &str, limit: i64) -> Result<Vec<LoginEvent>> {
        let events = sqlx::query_as::<_, LoginEvent>(
            r#"
            SELECT id, user_id, date, ip
            FROM login_history
            WHERE user_id = ?
            ORDER BY date DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(events)
    }

    async fn username_taken(&self, username: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn email_taken(&self, email: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(found.is_some())
    }
}

/// Map a lost insert race onto the duplicate errors
fn duplicate_from_constraint(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        let message = err
            .as_database_error()
            .map(|db| db.message().to_string())
            .unwrap_or_default();
        if message.contains("users.email") {
            return AppError::DuplicateEmail;
        }
        return AppError::DuplicateUsername;
    }
    AppError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);

        let created = users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();
        assert_eq!(created.username, "alice");
        assert_eq!(created.email, "a@x.com");

        let logged_in = users.login("alice", "secret1", "10.0.0.2").await.unwrap();
        assert_eq!(logged_in.id, created.id);
        assert_eq!(logged_in.username, "alice");

        // Email works as the login name too
        let by_email = users.login("a@x.com", "secret1", "10.0.0.2").await.unwrap();
        assert_eq!(by_email.id, created.id);
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_plaintext() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        let created = users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();

        let record = users.get_record(&created.id).await.unwrap().unwrap();
        assert_ne!(record.password, "secret1");
        assert!(record.password.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_registration_records_login_event() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        let created = users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();

        let history = users.login_history(&created.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ip.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_login_updates_last_login_and_history() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        let created = users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();

        users.login("alice", "secret1", "192.168.1.5").await.unwrap();

        let record = users.get_record(&created.id).await.unwrap().unwrap();
        assert_eq!(record.ip.as_deref(), Some("192.168.1.5"));
        assert!(record.last_login >= record.registered_at);

        let history = users.login_history(&created.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].ip.as_deref(), Some("192.168.1.5"));
    }

    #[tokio::test]
    async fn test_duplicate_username_performs_no_write() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();

        let err = users
            .register("alice", "other@x.com", "secret2", "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername));

        assert_eq!(count(&pool, "users").await, 1);
        assert_eq!(count(&pool, "login_history").await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();

        let err = users
            .register("bob", "a@x.com", "secret2", "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(count(&pool, "users").await, 1);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();

        let wrong_password = users.login("alice", "nope", "127.0.0.1").await.unwrap_err();
        let unknown_user = users.login("mallory", "secret1", "127.0.0.1").await.unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());

        // Unknown accounts still pay for a password verification
        assert!(crate::auth::password::DECOY_HASH.get().is_some());

        // Failed attempts leave no history
        assert_eq!(count(&pool, "login_history").await, 1);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let pool = test_pool().await;
        let users = UserRepository::new(&pool);
        let created = users
            .register("alice", "a@x.com", "secret1", "127.0.0.1")
            .await
            .unwrap();

        assert_eq!(users.find_by_id(&created.id).await.unwrap(), Some(created));
        assert_eq!(users.find_by_id("missing").await.unwrap(), None);
    }
}

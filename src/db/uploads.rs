//! Upload ledger operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Upload ledger row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub id: String,
    pub user_id: String,
    /// Ledger key, unique per upload event
    pub key: String,
    /// Content-addressed storage key, shared by identical bytes
    pub object_key: String,
    pub short_id: Option<String>,
    pub uploaded_at: String,
    pub ip: Option<String>,
}

/// Namespace an object key by owner and upload time
pub fn ledger_key(user_id: &str, object_key: &str, uploaded_at: &DateTime<Utc>) -> String {
    format!("{}/{}/{}", user_id, object_key, uploaded_at.timestamp_micros())
}

/// Upload repository
pub struct UploadRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UploadRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a ledger row for a completed upload
    pub async fn record(
        &self,
        user_id: &str,
        object_key: &str,
        ip: &str,
        short_id: Option<&str>,
    ) -> Result<Upload> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let uploaded_at = now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        let key = ledger_key(user_id, object_key, &now);

        sqlx::query(
            r#"
            INSERT INTO uploads (id, user_id, key, object_key, short_id, uploaded_at, ip)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&key)
        .bind(object_key)
        .bind(short_id)
        .bind(&uploaded_at)
        .bind(ip)
        .execute(self.pool)
        .await?;

        Ok(Upload {
            id,
            user_id: user_id.to_string(),
            key,
            object_key: object_key.to_string(),
            short_id: short_id.map(str::to_string),
            uploaded_at,
            ip: Some(ip.to_string()),
        })
    }

    /// Most recent uploads for a user
    pub async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<Upload>> {
        let uploads = sqlx::query_as::<_, Upload>(
            r#"
            SELECT id, user_id, key, object_key, short_id, uploaded_at, ip
            FROM uploads
            WHERE user_id = ?
            ORDER BY uploaded_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(uploads)
    }

    /// Look up an upload by its share token
    pub async fn find_by_short_id(&self, short_id: &str) -> Result<Upload> {
        sqlx::query_as::<_, Upload>(
            r#"
            SELECT id, user_id, key, object_key, short_id, uploaded_at, ip
            FROM uploads
            WHERE short_id = ?
            "#,
        )
        .bind(short_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("upload {}", short_id)))
    }

    /// Number of ledger rows pointing at an object
    pub async fn count_by_object_key(&self, object_key: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM uploads WHERE object_key = ?")
            .bind(object_key)
            .fetch_one(self.pool)
            .await?;

        Ok(count.0)
    }
}

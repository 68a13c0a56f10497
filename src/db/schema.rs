//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Registered accounts
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    -- argon2 PHC string
    password TEXT NOT NULL,
    registered_at TEXT NOT NULL,
    last_login TEXT NOT NULL,
    ip TEXT
);

-- One row per successful login or registration
CREATE TABLE IF NOT EXISTS login_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id),
    date TEXT NOT NULL,
    ip TEXT
);

CREATE INDEX IF NOT EXISTS idx_login_history_user_id ON login_history(user_id);

-- Upload ledger. object_key is shared by identical content,
-- key is namespaced per owner and upload time.
CREATE TABLE IF NOT EXISTS uploads (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    key TEXT NOT NULL UNIQUE,
    object_key TEXT NOT NULL,
    short_id TEXT UNIQUE,
    uploaded_at TEXT NOT NULL,
    ip TEXT
);

CREATE INDEX IF NOT EXISTS idx_uploads_user_id ON uploads(user_id, uploaded_at);
CREATE INDEX IF NOT EXISTS idx_uploads_object_key ON uploads(object_key);

-- Login sessions, keyed by the HMAC of the cookie token
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
"#;

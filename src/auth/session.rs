//! Cookie sessions
//!
//! The browser holds a random token; the database holds only its HMAC under
//! the server's session secret.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Duration;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::db::{PublicUser, SessionRepository};
use crate::error::{AppError, Result};

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "imgden_session";

/// Cookie carrying a one-shot flash message
pub const FLASH_COOKIE: &str = "imgden_flash";

/// Cookie remembering where to go after login
pub const RETURN_TO_COOKIE: &str = "imgden_return_to";

type HmacSha256 = Hmac<Sha256>;

/// Issues and resolves login sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                secret: secret.as_bytes().to_vec(),
                ttl: Duration::hours(ttl_hours),
            }),
        }
    }

    /// Start a session and return the token for the cookie
    pub async fn create(&self, pool: &SqlitePool, user_id: &str) -> Result<String> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        SessionRepository::new(pool)
            .insert(&self.digest(&token)?, user_id, self.inner.ttl)
            .await?;

        tracing::debug!(user_id = %user_id, "Session created");
        Ok(token)
    }

    /// Resolve a cookie token to its user
    pub async fn resolve(&self, pool: &SqlitePool, token: &str) -> Result<Option<PublicUser>> {
        SessionRepository::new(pool)
            .find_user(&self.digest(token)?)
            .await
    }

    /// End a session
    pub async fn revoke(&self, pool: &SqlitePool, token: &str) -> Result<()> {
        SessionRepository::new(pool)
            .delete(&self.digest(token)?)
            .await?;
        Ok(())
    }

    /// Session cookie for a freshly issued token
    ///
    /// Browser-session lifetime; expiry is enforced server-side.
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    fn digest(&self, token: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.inner.secret)
            .map_err(|e| AppError::Internal(format!("Invalid session secret: {}", e)))?;
        mac.update(token.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Short-lived cookie holding a flash message
pub fn flash_cookie(kind: FlashKind, message: &str) -> Cookie<'static> {
    let value = format!("{}:{}", kind.as_str(), urlencoding::encode(message));
    Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Decode a flash cookie value
pub fn parse_flash(value: &str) -> Option<(FlashKind, String)> {
    let (kind, message) = value.split_once(':')?;
    let kind = match kind {
        "success" => FlashKind::Success,
        "error" => FlashKind::Error,
        _ => return None,
    };
    let message = urlencoding::decode(message).ok()?.into_owned();
    Some((kind, message))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

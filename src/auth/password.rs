//! Password hashing
//!
//! Argon2id with a random 16-byte salt, stored as a PHC string. Hashing runs
//! on the blocking pool so it never stalls request handling.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;
use tokio::sync::OnceCell;

use crate::error::{AppError, Result};

/// Hash checked when no account matches, so both login failures cost one verification
pub(crate) static DECOY_HASH: OnceCell<String> = OnceCell::const_new();

/// Hash a plaintext password
pub async fn hash(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// Check a plaintext password against a stored hash
pub async fn verify(password: &str, stored: &str) -> Result<bool> {
    let password = password.to_string();
    let stored = stored.to_string();
    tokio::task::spawn_blocking(move || verify_blocking(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
}

/// Run a full verification against a throwaway hash
///
/// Always `false`.
pub async fn verify_decoy(password: &str) -> Result<bool> {
    let decoy = DECOY_HASH
        .get_or_try_init(|| hash("imgden-decoy-password"))
        .await?;
    verify(password, decoy).await?;
    Ok(false)
}

fn hash_blocking(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to encode salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_blocking(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AppError::Internal(format!("Stored password hash is malformed: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = hash("secret1").await.unwrap();
        assert!(verify("secret1", &hashed).await.unwrap());
        assert!(!verify("secret2", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let a = hash("secret1").await.unwrap();
        let b = hash("secret1").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_decoy_verification_never_matches() {
        assert!(!verify_decoy("secret1").await.unwrap());
        assert!(!verify_decoy("imgden-decoy-password").await.unwrap());
        assert!(DECOY_HASH.get().is_some_and(|h| h.starts_with("$argon2id$")));
    }

    #[tokio::test]
    async fn test_malformed_hash_is_an_error() {
        assert!(verify("secret1", "not-a-phc-string").await.is_err());
    }
}

//! Storage types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageError;

/// How long an upload grant stays valid
pub const UPLOAD_GRANT_TTL_SECS: u64 = 3600;

/// Authorization to write exactly one key
///
/// For S3 backends this is a presigned `PUT` request.
#[derive(Debug, Clone, Serialize)]
pub struct UploadGrant {
    pub key: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub expires_at: DateTime<Utc>,
}

impl UploadGrant {
    /// Check that the grant covers `key` and has not expired
    pub fn authorize(&self, key: &str) -> Result<(), StorageError> {
        if self.key != key {
            return Err(StorageError::GrantMismatch {
                granted: self.key.clone(),
                requested: key.to_string(),
            });
        }
        if self.expires_at <= Utc::now() {
            return Err(StorageError::Presign(format!("grant for {} expired", key)));
        }
        Ok(())
    }
}

/// Remote object storage as consumed by the upload flow
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists under `key`
    ///
    /// Fails open: backend errors are logged and reported as `false`.
    async fn exists(&self, key: &str) -> bool;

    /// Issue an upload authorization scoped to `key`
    async fn grant_upload(&self, key: &str) -> Result<UploadGrant, StorageError>;

    /// Upload `data` under the grant's key
    async fn put(&self, grant: &UploadGrant, data: &[u8]) -> Result<(), StorageError>;

    /// Public URL of `key`
    fn public_url(&self, key: &str) -> String;
}

/// Join a public domain and an object key
pub fn join_public_url(domain: &str, key: &str) -> String {
    format!("{}/{}", domain.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Content type implied by a key's extension
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

//! In-process object store
//!
//! Keeps objects in memory. Used for local development without a bucket and
//! as the storage backend in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::StorageError;

use super::types::{join_public_url, ObjectStore, UploadGrant, UPLOAD_GRANT_TTL_SECS};

/// Memory-backed object store
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

struct MemoryStoreInner {
    bucket: String,
    public_domain: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>, public_domain: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner {
                bucket: bucket.into(),
                public_domain: public_domain.into(),
                objects: RwLock::new(HashMap::new()),
                puts: AtomicUsize::new(0),
            }),
        }
    }

    /// Get a stored object
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.objects.read().await.get(key).cloned()
    }

    /// Number of objects currently stored
    pub async fn len(&self) -> usize {
        self.inner.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of `put` calls served so far
    pub fn put_count(&self) -> usize {
        self.inner.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> bool {
        self.inner.objects.read().await.contains_key(key)
    }

    async fn grant_upload(&self, key: &str) -> Result<UploadGrant, StorageError> {
        Ok(UploadGrant {
            key: key.to_string(),
            method: "PUT".to_string(),
            url: format!("memory://{}/{}", self.inner.bucket, key),
            headers: Vec::new(),
            expires_at: Utc::now() + chrono::Duration::seconds(UPLOAD_GRANT_TTL_SECS as i64),
        })
    }

    async fn put(&self, grant: &UploadGrant, data: &[u8]) -> Result<(), StorageError> {
        grant.authorize(&grant.key)?;
        self.inner.puts.fetch_add(1, Ordering::SeqCst);
        self.inner
            .objects
            .write()
            .await
            .insert(grant.key.clone(), data.to_vec());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.inner.public_domain, key)
    }
}

//! Upload Service
//!
//! Content-addressed upload flow: hash the bytes, skip the transfer when the
//! object already exists, and record one ledger row per upload either way.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::SqlitePool;

use crate::db::{Upload, UploadRepository};
use crate::error::{is_unique_violation, AppError, Result};
use crate::storage::ObjectStore;

use super::hasher::object_key;
use super::types::{HistoryEntry, UploadOutcome, SHORT_ID_LEN};

/// Orchestrates deduplicated uploads
#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
}

impl UploadService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Store `data` for `user_id` and record the upload
    ///
    /// No retries: a failed transfer surfaces once and writes no ledger row.
    pub async fn handle_upload(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        data: &[u8],
        ip: &str,
    ) -> Result<UploadOutcome> {
        if data.is_empty() {
            return Err(AppError::Validation("Please choose a file to upload".to_string()));
        }

        let key = object_key(data);
        let deduplicated = self.store.exists(&key).await;

        if deduplicated {
            tracing::info!(key = %key, user_id = %user_id, "Object already stored, skipping upload");
        } else {
            let grant = self
                .store
                .grant_upload(&key)
                .await
                .map_err(|e| AppError::Upload(e.to_string()))?;

            self.store
                .put(&grant, data)
                .await
                .map_err(|e| AppError::Upload(e.to_string()))?;

            tracing::info!(key = %key, user_id = %user_id, size = data.len(), "Object uploaded");
        }

        let short_id = record_with_short_id(pool, user_id, &key, ip, generate_short_id).await?;

        Ok(UploadOutcome {
            image_url: self.store.public_url(&key),
            key,
            short_id,
            deduplicated,
        })
    }

    /// A user's most recent uploads with their public URLs
    pub async fn history(&self, pool: &SqlitePool, user_id: &str, limit: i64) -> Result<Vec<HistoryEntry>> {
        let uploads = UploadRepository::new(pool).list_by_user(user_id, limit).await?;

        Ok(uploads
            .into_iter()
            .map(|upload| HistoryEntry {
                url: self.store.public_url(&upload.object_key),
                key: upload.object_key,
                short_id: upload.short_id,
                uploaded_at: upload.uploaded_at,
            })
            .collect())
    }

    /// Resolve a share token to its upload and public URL
    pub async fn resolve_short_id(&self, pool: &SqlitePool, short_id: &str) -> Result<(Upload, String)> {
        let upload = UploadRepository::new(pool).find_by_short_id(short_id).await?;
        let url = self.store.public_url(&upload.object_key);
        Ok((upload, url))
    }
}

/// Unique-constraint collisions on the ledger row are retried a few times with a fresh short id
const SHORT_ID_ATTEMPTS: usize = 3;

async fn record_with_short_id<F>(
    pool: &SqlitePool,
    user_id: &str,
    key: &str,
    ip: &str,
    mut next_short_id: F,
) -> Result<String>
where
    F: FnMut() -> String,
{
    let repo = UploadRepository::new(pool);
    let mut attempt = 1;
    loop {
        let short_id = next_short_id();
        match repo.record(user_id, key, ip, Some(&short_id)).await {
            Ok(_) => return Ok(short_id),
            Err(AppError::Database(e)) if is_unique_violation(&e) && attempt < SHORT_ID_ATTEMPTS => {
                tracing::warn!(short_id = %short_id, attempt, "Ledger row collision, retrying with a new short id");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Random alphanumeric share token
pub fn generate_short_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, UserRepository};
    use crate::error::StorageError;
    use crate::storage::{MemoryStore, UploadGrant};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00";

    fn memory() -> MemoryStore {
        MemoryStore::new("images", "https://img.example.com")
    }

    async fn user(pool: &SqlitePool, name: &str) -> String {
        UserRepository::new(pool)
            .register(name, &format!("{}@x.com", name), "secret1", "127.0.0.1")
            .await
            .unwrap()
            .id
    }

    /// Store whose existence check always fails open and whose puts can be refused
    struct FlakyStore {
        inner: MemoryStore,
        refuse_puts: bool,
        put_attempts: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn exists(&self, _key: &str) -> bool {
            false
        }

        async fn grant_upload(&self, key: &str) -> std::result::Result<UploadGrant, StorageError> {
            self.inner.grant_upload(key).await
        }

        async fn put(&self, grant: &UploadGrant, data: &[u8]) -> std::result::Result<(), StorageError> {
            self.put_attempts.fetch_add(1, Ordering::SeqCst);
            if self.refuse_puts {
                return Err(StorageError::Transfer("status 503".to_string()));
            }
            self.inner.put(grant, data).await
        }

        fn public_url(&self, key: &str) -> String {
            self.inner.public_url(key)
        }
    }

    #[test]
    fn test_short_id_shape() {
        let id = generate_short_id();
        assert_eq!(id.len(), SHORT_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_short_id(), generate_short_id());
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let pool = test_pool().await;
        let owner = user(&pool, "alice").await;
        let store = memory();
        let service = UploadService::new(Arc::new(store.clone()));

        let err = service
            .handle_upload(&pool, &owner, b"", "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_same_bytes_twice_uploads_once() {
        let pool = test_pool().await;
        let owner = user(&pool, "alice").await;
        let store = memory();
        let service = UploadService::new(Arc::new(store.clone()));

        let first = service
            .handle_upload(&pool, &owner, PNG_BYTES, "127.0.0.1")
            .await
            .unwrap();
        assert!(!first.deduplicated);
        assert_eq!(store.put_count(), 1);

        let second = service
            .handle_upload(&pool, &owner, PNG_BYTES, "127.0.0.1")
            .await
            .unwrap();
        assert!(second.deduplicated);
        assert_eq!(store.put_count(), 1);

        assert_eq!(first.key, second.key);
        assert_eq!(first.image_url, format!("https://img.example.com/{}", first.key));
        assert_ne!(first.short_id, second.short_id);

        let rows = UploadRepository::new(&pool).list_by_user(&owner, 50).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].key, rows[1].key);
        assert!(rows.iter().all(|r| r.object_key == first.key));
    }

    #[tokio::test]
    async fn test_key_is_independent_of_uploader() {
        let pool = test_pool().await;
        let alice = user(&pool, "alice").await;
        let bob = user(&pool, "bob").await;
        let store = memory();
        let service = UploadService::new(Arc::new(store.clone()));

        let a = service.handle_upload(&pool, &alice, PNG_BYTES, "10.0.0.1").await.unwrap();
        let b = service.handle_upload(&pool, &bob, PNG_BYTES, "10.0.0.2").await.unwrap();

        assert_eq!(a.key, b.key);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.put_count(), 1);

        let uploads = UploadRepository::new(&pool);
        assert_eq!(uploads.count_by_object_key(&a.key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_existence_check_falls_through_to_upload() {
        let pool = test_pool().await;
        let owner = user(&pool, "alice").await;
        let store = Arc::new(FlakyStore {
            inner: memory(),
            refuse_puts: false,
            put_attempts: AtomicUsize::new(0),
        });
        let service = UploadService::new(store.clone());

        service.handle_upload(&pool, &owner, PNG_BYTES, "127.0.0.1").await.unwrap();
        service.handle_upload(&pool, &owner, PNG_BYTES, "127.0.0.1").await.unwrap();

        // Both attempts wrote identical bytes under the same key
        assert_eq!(store.put_attempts.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.len().await, 1);
        assert_eq!(store.inner.get(&object_key(PNG_BYTES)).await.unwrap(), PNG_BYTES);
    }

    #[tokio::test]
    async fn test_put_failure_writes_no_ledger_row() {
        let pool = test_pool().await;
        let owner = user(&pool, "alice").await;
        let store = Arc::new(FlakyStore {
            inner: memory(),
            refuse_puts: true,
            put_attempts: AtomicUsize::new(0),
        });
        let service = UploadService::new(store.clone());

        let err = service
            .handle_upload(&pool, &owner, PNG_BYTES, "127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
        assert_eq!(store.put_attempts.load(Ordering::SeqCst), 1);

        let rows = UploadRepository::new(&pool).list_by_user(&owner, 50).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_capped() {
        let pool = test_pool().await;
        let owner = user(&pool, "alice").await;
        let service = UploadService::new(Arc::new(memory()));

        let mut keys = Vec::new();
        for payload in [&b"one"[..], &b"two"[..], &b"three"[..]] {
            let outcome = service.handle_upload(&pool, &owner, payload, "127.0.0.1").await.unwrap();
            keys.push(outcome.key);
        }

        let history = service.history(&pool, &owner, 50).await.unwrap();
        let listed: Vec<_> = history.iter().map(|h| h.key.clone()).collect();
        keys.reverse();
        assert_eq!(listed, keys);
        assert_eq!(history[0].url, format!("https://img.example.com/{}", keys[0]));

        let capped = service.history(&pool, &owner, 2).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].key, keys[0]);
    }

    #[tokio::test]
    async fn test_resolve_short_id() {
        let pool = test_pool().await;
        let owner = user(&pool, "alice").await;
        let service = UploadService::new(Arc::new(memory()));

        let outcome = service.handle_upload(&pool, &owner, PNG_BYTES, "127.0.0.1").await.unwrap();
        let (upload, url) = service.resolve_short_id(&pool, &outcome.short_id).await.unwrap();
        assert_eq!(upload.user_id, owner);
        assert_eq!(url, outcome.image_url);

        assert!(matches!(
            service.resolve_short_id(&pool, "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    fn scripted_ids(ids: &'static [&'static str]) -> impl FnMut() -> String {
        let mut ids = ids.iter();
        move || ids.next().map(|id| id.to_string()).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_short_id_collision_is_retried() {
        let pool = test_pool().await;
        let alice = user(&pool, "alice").await;

        let first = record_with_short_id(&pool, &alice, "a.png", "ip", scripted_ids(&["takenid001"]))
            .await
            .unwrap();
        assert_eq!(first, "takenid001");

        let second = record_with_short_id(
            &pool,
            &alice,
            "b.png",
            "ip",
            scripted_ids(&["takenid001", "freshid002"]),
        )
        .await
        .unwrap();
        assert_eq!(second, "freshid002");
        assert_eq!(UploadRepository::new(&pool).list_by_user(&alice, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_short_id_retries_are_bounded() {
        let pool = test_pool().await;
        let alice = user(&pool, "alice").await;
        record_with_short_id(&pool, &alice, "a.png", "ip", scripted_ids(&["takenid001"]))
            .await
            .unwrap();

        let err = record_with_short_id(
            &pool,
            &alice,
            "b.png",
            "ip",
            scripted_ids(&["takenid001", "takenid001", "takenid001", "freshid002"]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(UploadRepository::new(&pool).list_by_user(&alice, 10).await.unwrap().len(), 1);
    }
}

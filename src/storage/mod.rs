//! Storage module for object storage backends
//!
//! Supports MinIO, Cloudflare R2, Backblaze B2, and AWS S3, plus an
//! in-process store for development and tests.

mod memory;
mod s3_client;
mod types;

use std::sync::Arc;

pub use memory::MemoryStore;
pub use s3_client::S3Client;
pub use types::*;

use crate::config::{StorageConfig, StorageProvider};
use crate::error::StorageError;

/// Build the object store selected by configuration
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.provider {
        StorageProvider::Memory => {
            tracing::warn!("Using in-memory object store, uploads will not survive a restart");
            Ok(Arc::new(MemoryStore::new(
                config.bucket.clone(),
                config.public_domain.clone(),
            )))
        }
        _ => Ok(Arc::new(S3Client::new(config).await?)),
    }
}

//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible storage access. Uploads go through a
//! presigned `PUT` so every write is authorized for exactly one key.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    Client,
};
use chrono::Utc;

use crate::config::StorageConfig;
use crate::error::StorageError;

use super::types::{content_type_for, join_public_url, ObjectStore, UploadGrant, UPLOAD_GRANT_TTL_SECS};

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    http: reqwest::Client,
    bucket: String,
    public_domain: String,
}

impl S3Client {
    /// Create a new S3 client from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "imgden",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and other S3-compatible services
            .build();

        let client = Client::from_conf(s3_config);

        // Test connection by checking if bucket exists
        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    e
                );
            }
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::Transfer(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http,
            bucket,
            public_domain: config.public_domain.clone(),
        })
    }

    /// Check if an object exists, surfacing backend errors
    pub async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match e.as_service_error() {
                Some(service_err) if service_err.is_not_found() => Ok(false),
                _ => Err(StorageError::SdkError(format!(
                    "Failed to head object {}: {}",
                    key, e
                ))),
            },
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn exists(&self, key: &str) -> bool {
        match self.object_exists(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Existence check failed, treating as missing");
                false
            }
        }
    }

    async fn grant_upload(&self, key: &str) -> Result<UploadGrant, StorageError> {
        let ttl = Duration::from_secs(UPLOAD_GRANT_TTL_SECS);
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key))
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(format!("Failed to presign {}: {}", key, e)))?;

        Ok(UploadGrant {
            key: key.to_string(),
            method: request.method().to_string(),
            url: request.uri().to_string(),
            headers: request
                .headers()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            expires_at: Utc::now() + chrono::Duration::seconds(UPLOAD_GRANT_TTL_SECS as i64),
        })
    }

    async fn put(&self, grant: &UploadGrant, data: &[u8]) -> Result<(), StorageError> {
        grant.authorize(&grant.key)?;

        let mut request = self.http.put(&grant.url).body(data.to_vec());
        for (name, value) in &grant.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Transfer(format!("Failed to upload {}: {}", grant.key, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Transfer(format!(
                "Upload of {} rejected with status {}",
                grant.key, status
            )));
        }

        tracing::debug!(key = %grant.key, size = data.len(), "Object stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_domain, key)
    }
}

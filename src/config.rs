//! Configuration management for imgden

use rand::RngCore;
use serde::Deserialize;
use std::env;

/// Default upload size limit: 5MB
pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Default number of uploads shown in a user's history
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    /// Base URL that serves bucket objects publicly
    pub public_domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Minio,
    R2,
    S3,
    B2,
    /// In-process store, nothing leaves the server
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub history_limit: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                static_dir: "public".to_string(),
            },
            storage: StorageConfig {
                provider: StorageProvider::Minio,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "images".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
                public_domain: "http://localhost:9000/images".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite:./imgden.db".to_string(),
            },
            session: SessionConfig {
                secret: "change-me-in-production".to_string(),
                ttl_hours: 24 * 7,
            },
            upload: UploadConfig {
                max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
                history_limit: DEFAULT_HISTORY_LIMIT,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from a variable lookup
    ///
    /// Only the S3 connection settings of remote providers are required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, env::VarError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or(env::VarError::NotPresent);

        let provider = StorageProvider::parse(
            &lookup("S3_PROVIDER").unwrap_or_else(|| "minio".to_string()),
        );

        // The memory provider needs no remote credentials
        let (endpoint, bucket, access_key, secret_key) = if provider == StorageProvider::Memory {
            (
                lookup("S3_ENDPOINT").unwrap_or_default(),
                lookup("S3_BUCKET").unwrap_or_else(|| "images".to_string()),
                String::new(),
                String::new(),
            )
        } else {
            (
                required("S3_ENDPOINT")?,
                required("S3_BUCKET")?,
                required("S3_ACCESS_KEY")?,
                required("S3_SECRET_KEY")?,
            )
        };

        let public_domain = lookup("S3_PUBLIC_DOMAIN")
            .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));

        let secret = match lookup("SESSION_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("SESSION_SECRET not set, using a random secret; sessions end on restart");
                ephemeral_secret()
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: lookup("SERVER_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3000),
                static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "public".to_string()),
            },
            storage: StorageConfig {
                provider,
                endpoint,
                bucket,
                access_key,
                secret_key,
                region: lookup("S3_REGION"),
                public_domain,
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:./imgden.db".to_string()),
            },
            session: SessionConfig {
                secret,
                ttl_hours: lookup("SESSION_TTL_HOURS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(24 * 7),
            },
            upload: UploadConfig {
                max_bytes: lookup("UPLOAD_MAX_BYTES")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_UPLOAD_MAX_BYTES),
                history_limit: lookup("HISTORY_LIMIT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_HISTORY_LIMIT),
            },
        })
    }
}

impl UploadConfig {
    /// History page size, never below one entry
    pub fn history_cap(&self) -> i64 {
        self.history_limit.max(1)
    }
}

fn ephemeral_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl StorageProvider {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            "memory" => StorageProvider::Memory,
            _ => StorageProvider::Minio,
        }
    }
}

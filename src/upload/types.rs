//! Upload request and response types

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// File name extensions accepted for upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Length of generated share tokens
pub const SHORT_ID_LEN: usize = 10;

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub image_url: String,
    /// Content-addressed object key
    pub key: String,
    pub short_id: String,
    /// True when the object already existed and no bytes were sent
    pub deduplicated: bool,
}

/// JSON body returned by `POST /upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub image_url: String,
    pub key: String,
    pub short_id: String,
    pub share_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    pub fn from_outcome(outcome: UploadOutcome) -> Self {
        let message = outcome
            .deduplicated
            .then(|| "File already exists and has been linked to your account".to_string());

        Self {
            success: true,
            share_url: format!("/s/{}", outcome.short_id),
            image_url: outcome.image_url,
            key: outcome.key,
            short_id: outcome.short_id,
            message,
        }
    }
}

/// One entry of a user's upload history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub key: String,
    pub url: String,
    pub short_id: Option<String>,
    pub uploaded_at: String,
}

/// Reject file names without an image extension
pub fn validate_file_name(file_name: Option<&str>) -> Result<()> {
    let allowed = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(AppError::Validation("Only image files are allowed".to_string()))
    }
}

/// Reject empty or oversized payloads
pub fn validate_size(len: usize, max_bytes: usize) -> Result<()> {
    if len == 0 {
        return Err(AppError::Validation("Please choose a file to upload".to_string()));
    }
    if len > max_bytes {
        let limit = if max_bytes >= 1024 * 1024 {
            format!("{} MB", max_bytes / (1024 * 1024))
        } else {
            format!("{} bytes", max_bytes)
        };
        return Err(AppError::Validation(format!("File is larger than {}", limit)));
    }
    Ok(())
}

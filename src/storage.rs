//! Product images in an S3-compatible bucket (Cloudflare R2).

use std::path::Path;

use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Builder, Credentials, Region},
    primitives::ByteStream,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::StorageConfig,
    error::{AppError, AppResult},
};

/// 5 MiB
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

pub struct ImageStorage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl ImageStorage {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "r2",
        );
        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint())
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    /// Object key for a URL previously produced by [`Self::public_url_for`].
    pub fn key_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
    }

    /// Validate and store an image, returning its key.
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        validate_image(content_type, bytes.len())?;
        let key = unique_object_key(file_name, Utc::now());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "image upload failed");
                AppError::Storage(format!("upload of {key} failed"))
            })?;

        tracing::info!(key = %key, "image uploaded");
        Ok(key)
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete of {key} failed: {e}")))?;
        Ok(())
    }
}

pub fn validate_image(content_type: &str, len: usize) -> AppResult<()> {
    if len == 0 {
        return Err(AppError::BadRequest("Image file is empty".into()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(AppError::BadRequest(
            "File size exceeds the maximum allowed limit of 5MB".into(),
        ));
    }
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(AppError::BadRequest(
            "Unsupported file type. Only JPEG, PNG, and WEBP are allowed".into(),
        ));
    }
    Ok(())
}

/// `<stem>_<yyyyMMddHHmmss>_<8 hex><.ext>`, stem restricted to `[A-Za-z0-9_-]`.
pub fn unique_object_key(original_name: &str, now: DateTime<Utc>) -> String {
    let path = Path::new(original_name);
    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let stem = if stem.is_empty() { "image".to_string() } else { stem };
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();

    format!(
        "{}_{}_{}{}",
        stem,
        now.format("%Y%m%d%H%M%S"),
        &suffix[..8],
        extension
    )
}

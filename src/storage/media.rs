//! Media storage using Cloudflare R2
//!
//! Handles upload, delete, and URL mapping for media files.
//! Files are served via R2 Custom Domain (CDN).

use std::path::Path;

use aws_sdk_s3::Client as S3Client;

use crate::error::AppError;

/// File extension for an uploaded MIME type, falling back to the
/// client-supplied file name.
pub fn extension_for(content_type: &str, file_name: Option<&str>) -> String {
    let known = match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

/// Media storage service
///
/// Uploads media to Cloudflare R2 and returns public URLs.
pub struct MediaStorage {
    /// S3-compatible client for R2
    client: S3Client,
    /// Media bucket name
    bucket: String,
    /// Public URL base (Custom Domain) without trailing slash
    public_url: String,
}

impl MediaStorage {
    /// Create new media storage client
    ///
    /// No network traffic happens until the first upload or delete.
    pub fn new(
        config: &crate::config::StorageConfig,
        cloudflare: &crate::config::CloudflareConfig,
    ) -> Result<Self, AppError> {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

        // R2 endpoint: https://{account_id}.r2.cloudflarestorage.com
        let endpoint = format!("https://{}.r2.cloudflarestorage.com", cloudflare.account_id);

        let credentials = Credentials::new(
            &cloudflare.r2_access_key_id,
            &cloudflare.r2_secret_access_key,
            None,
            None,
            "linko-r2",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(&endpoint)
            .credentials_provider(credentials)
            .http_client(super::build_r2_http_client())
            .build();

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Stream a spooled file to the bucket
    ///
    /// # Returns
    /// Public URL for the uploaded file
    pub async fn upload_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, AppError> {
        use aws_sdk_s3::primitives::ByteStream;

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to read upload: {e}")))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .cache_control("public, max-age=31536000")
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("R2 upload failed: {}", e)))?;

        tracing::debug!(key = %key, "Media uploaded");
        Ok(self.get_public_url(key))
    }

    /// Delete media file
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("R2 delete failed: {}", e)))?;

        Ok(())
    }

    /// Delete the object behind a public URL, logging instead of failing.
    ///
    /// URLs outside the media domain are ignored.
    pub async fn delete_url_best_effort(&self, url: &str) {
        let Some(key) = self.key_for_url(url) else {
            return;
        };

        if let Err(error) = self.delete(&key).await {
            tracing::warn!(%error, key = %key, "Failed to delete remote media");
        }
    }

    /// Get public URL for an S3 key
    pub fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    /// Object key for a URL served from this bucket, `None` for foreign URLs
    pub fn key_for_url(&self, url: &str) -> Option<String> {
        let url = url.trim();
        let rest = url.strip_prefix(&self.public_url)?.strip_prefix('/')?;
        let key = rest.split(['?', '#']).next()?;
        if key.is_empty() {
            return None;
        }
        urlencoding::decode(key).ok().map(|key| key.into_owned())
    }

    pub fn is_media_url(&self, url: &str) -> bool {
        self.key_for_url(url).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloudflareConfig, StorageConfig};

    fn storage() -> MediaStorage {
        MediaStorage::new(
            &StorageConfig {
                bucket: "media".to_string(),
                public_url: "https://media.example.com/".to_string(),
            },
            &CloudflareConfig {
                account_id: "account".to_string(),
                r2_access_key_id: "key".to_string(),
                r2_secret_access_key: "secret".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn key_for_url_maps_own_domain_only() {
        let storage = storage();
        assert_eq!(
            storage.key_for_url("https://media.example.com/posts/01H.png?v=2"),
            Some("posts/01H.png".to_string())
        );
        assert_eq!(storage.key_for_url("https://elsewhere.com/posts/01H.png"), None);
        assert_eq!(storage.key_for_url("https://media.example.com.evil.io/x.png"), None);
        assert_eq!(storage.key_for_url("https://media.example.com/"), None);
        assert!(!storage.is_media_url("hello there"));
    }

    #[test]
    fn public_url_round_trips_key() {
        let storage = storage();
        let url = storage.get_public_url("posts/a%20b.jpg");
        assert_eq!(url, "https://media.example.com/posts/a%20b.jpg");
        assert_eq!(storage.key_for_url(&url), Some("posts/a b.jpg".to_string()));
    }

    #[test]
    fn extension_prefers_mime_then_file_name() {
        assert_eq!(extension_for("image/png", Some("x.gif")), "png");
        assert_eq!(extension_for("video/x-matroska", Some("clip.MKV")), "mkv");
        assert_eq!(extension_for("image/heic", None), "bin");
        assert_eq!(extension_for("image/heic", Some("../../etc")), "bin");
    }
}

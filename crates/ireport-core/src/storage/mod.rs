//! Blob storage client for incident media.
//!
//! Media files are uploaded once per file before the owning incident record
//! is created; the returned public URLs are stored on the record.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Default storage bucket for incident media
pub const DEFAULT_MEDIA_BUCKET: &str = "incident-media";

/// Media upload operations shared across storage backends.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Upload object bytes and return the public URL they are served from.
    async fn upload(&self, object_key: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// reqwest-backed storage client for a bucketed object API.
///
/// Uploads go to `{base}/storage/v1/object/{bucket}/{key}`; public URLs are
/// derived under `{base}/storage/v1/object/public/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct RestStorage {
    base_url: String,
    bucket: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestStorage {
    /// Build a storage client for an explicit API base URL and bucket.
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::InvalidInput("Storage base URL must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(
                "Storage base URL must include http:// or https://".to_string(),
            ));
        }
        let bucket = normalize_text_option(Some(bucket.into()))
            .ok_or_else(|| Error::InvalidInput("Storage bucket must not be empty".to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            api_key: api_key.into(),
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Public URL an object key is served from.
    #[must_use]
    pub fn public_object_url(&self, object_key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, object_key
        )
    }
}

#[async_trait]
impl BlobStorage for RestStorage {
    async fn upload(&self, object_key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let object_key = normalize_object_key(object_key)?;
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, object_key
        );

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Storage(format!(
                "Upload failed with HTTP {status}: {}",
                compact_text(&body)
            )));
        }

        Ok(self.public_object_url(&object_key))
    }
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/');
    if object_key.is_empty() {
        return Err(Error::Storage("Object key must not be empty".to_string()));
    }
    Ok(object_key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_storage_rejects_invalid_config() {
        assert!(RestStorage::new("", "bucket", "key").is_err());
        assert!(RestStorage::new("example.com", "bucket", "key").is_err());
        assert!(RestStorage::new("https://example.com", "  ", "key").is_err());
    }

    #[test]
    fn public_object_url_shape() {
        let storage = RestStorage::new("https://api.example.com/", "incident-media", "key").unwrap();
        assert_eq!(
            storage.public_object_url("incidents/abc.jpg"),
            "https://api.example.com/storage/v1/object/public/incident-media/incidents/abc.jpg"
        );
    }

    #[test]
    fn normalize_object_key_strips_slashes() {
        assert_eq!(
            normalize_object_key("/incidents/a.jpg/").unwrap(),
            "incidents/a.jpg"
        );
        assert!(normalize_object_key("  ").is_err());
    }
}

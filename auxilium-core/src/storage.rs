//! Media storage for citizen-submitted photos and audio clips.
//!
//! A `MediaStorage` trait with three implementations:
//! - **Supabase** — uploads to a Supabase Storage bucket, public URLs
//! - **Local** — writes to a directory the server serves at /uploads
//! - **Fallback** — Supabase with graceful degradation to local disk
//!
//! The fallback strategy is what the intake pipeline is wired with: a
//! storage outage must never abort a citizen-facing submission.

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::StorageConfig;

// ============================================================================
// MediaStorage trait
// ============================================================================

/// Abstraction over blob storage. `upload` returns a URL usable by the
/// mobile app and by the remote classifier.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Local write failed: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// SupabaseStorage
// ============================================================================

/// Supabase Storage client. Objects land in one public bucket; uploads use
/// upsert so the deterministic per-report filenames overwrite on re-submit.
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(base_url: String, bucket: String, service_key: String) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            service_key,
        })
    }

    /// Create the bucket, tolerating "already exists" as success.
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/bucket", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "name": self.bucket, "public": true }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if body.contains("already exists") || body.contains("Duplicate") {
            return Ok(());
        }

        Err(StorageError::Api {
            code: status.as_u16(),
            message: body,
        })
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, filename
        )
    }
}

#[async_trait]
impl MediaStorage for SupabaseStorage {
    async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.ensure_bucket().await?;

        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, filename);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(data.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Supabase upload failed");
            return Err(StorageError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(self.public_url(filename))
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

// ============================================================================
// LocalStorage
// ============================================================================

/// Writes media to a directory served statically at /uploads.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: String) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(filename), data).await?;
        Ok(format!("{}/uploads/{}", self.public_base_url, filename))
    }

    fn name(&self) -> &str {
        "local"
    }
}

// ============================================================================
// FallbackStorage
// ============================================================================

/// Supabase with degradation to local disk. On any remote failure the file
/// is written locally; images get the configured placeholder URL (the local
/// server is not reachable by the remote classifier), everything else gets
/// the local /uploads URL. `upload` only errors when the local write itself
/// fails.
pub struct FallbackStorage {
    primary: Option<SupabaseStorage>,
    local: LocalStorage,
    placeholder_photo_url: String,
}

impl FallbackStorage {
    pub fn new(
        primary: Option<SupabaseStorage>,
        local: LocalStorage,
        placeholder_photo_url: String,
    ) -> Self {
        Self {
            primary,
            local,
            placeholder_photo_url,
        }
    }

    /// Wire the strategy from configuration. An empty service key disables
    /// the remote backend entirely.
    pub fn from_config(config: &StorageConfig, public_base_url: &str) -> Result<Self, StorageError> {
        let primary = if config.supabase_service_key.is_empty() {
            None
        } else {
            Some(SupabaseStorage::new(
                config.supabase_url.clone(),
                config.bucket.clone(),
                config.supabase_service_key.clone(),
            )?)
        };

        Ok(Self {
            primary,
            local: LocalStorage::new(config.local_dir.clone(), public_base_url.to_string()),
            placeholder_photo_url: config.placeholder_photo_url.clone(),
        })
    }

    async fn degrade(
        &self,
        data: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let local_url = self.local.upload(data, filename, content_type).await?;
        if content_type.starts_with("image/") {
            Ok(self.placeholder_photo_url.clone())
        } else {
            Ok(local_url)
        }
    }
}

#[async_trait]
impl MediaStorage for FallbackStorage {
    async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        match &self.primary {
            Some(primary) => match primary.upload(data, filename, content_type).await {
                Ok(url) => Ok(url),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        filename = filename,
                        "Supabase upload failed — saving to local disk"
                    );
                    self.degrade(data, filename, content_type).await
                }
            },
            None => self.degrade(data, filename, content_type).await,
        }
    }

    fn name(&self) -> &str {
        "supabase-fallback-local"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLACEHOLDER: &str = "https://images.example/placeholder.jpg";

    fn supabase(base_url: String) -> SupabaseStorage {
        SupabaseStorage::new(base_url, "emergencies".to_string(), "service-key".to_string())
            .expect("Failed to create storage client")
    }

    #[tokio::test]
    async fn local_storage_writes_file_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8002".to_string());

        let url = storage
            .upload(b"jpeg bytes", "photo_1_48.85_2.35.jpg", "image/jpeg")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:8002/uploads/photo_1_48.85_2.35.jpg");
        let written = std::fs::read(dir.path().join("photo_1_48.85_2.35.jpg")).unwrap();
        assert_eq!(written, b"jpeg bytes");
    }

    #[tokio::test]
    async fn supabase_upload_returns_public_url() {
        let mock_server = MockServer::start().await;
        let storage = supabase(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/storage/v1/bucket"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/emergencies/photo_1_48.85_2.35.jpg"))
            .and(header("content-type", "image/jpeg"))
            .and(header("x-upsert", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Key": "emergencies/photo_1_48.85_2.35.jpg"
            })))
            .mount(&mock_server)
            .await;

        let url = storage
            .upload(b"jpeg bytes", "photo_1_48.85_2.35.jpg", "image/jpeg")
            .await
            .unwrap();

        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/public/emergencies/photo_1_48.85_2.35.jpg",
                mock_server.uri()
            )
        );
    }

    #[tokio::test]
    async fn bucket_already_exists_is_tolerated() {
        let mock_server = MockServer::start().await;
        let storage = supabase(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/storage/v1/bucket"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "statusCode": "409", "error": "Duplicate", "message": "The resource already exists"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/emergencies/audio_1_48.85_2.35.m4a"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let result = storage
            .upload(b"aac bytes", "audio_1_48.85_2.35.m4a", "audio/m4a")
            .await;

        assert!(result.is_ok(), "Duplicate bucket must not fail the upload: {:?}", result.err());
    }

    #[tokio::test]
    async fn supabase_upload_propagates_api_error() {
        let mock_server = MockServer::start().await;
        let storage = supabase(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/storage/v1/bucket"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/emergencies/photo.jpg"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid signature"))
            .mount(&mock_server)
            .await;

        let result = storage.upload(b"x", "photo.jpg", "image/jpeg").await;
        match result {
            Err(StorageError::Api { code, .. }) => assert_eq!(code, 403),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fallback_substitutes_placeholder_for_images() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let storage = FallbackStorage::new(
            Some(supabase(mock_server.uri())),
            LocalStorage::new(dir.path(), "http://localhost:8002".to_string()),
            PLACEHOLDER.to_string(),
        );

        let url = storage
            .upload(b"jpeg bytes", "photo_1_0_0.jpg", "image/jpeg")
            .await
            .expect("fallback must not error on remote failure");

        assert_eq!(url, PLACEHOLDER);
        assert!(dir.path().join("photo_1_0_0.jpg").exists(), "file must be saved locally");
    }

    #[tokio::test]
    async fn fallback_serves_audio_from_local_url() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let storage = FallbackStorage::new(
            Some(supabase(mock_server.uri())),
            LocalStorage::new(dir.path(), "http://localhost:8002".to_string()),
            PLACEHOLDER.to_string(),
        );

        let url = storage
            .upload(b"aac bytes", "audio_1_0_0.m4a", "audio/m4a")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:8002/uploads/audio_1_0_0.m4a");
    }

    #[tokio::test]
    async fn fallback_without_primary_goes_straight_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FallbackStorage::new(
            None,
            LocalStorage::new(dir.path(), "http://localhost:8002".to_string()),
            PLACEHOLDER.to_string(),
        );

        let url = storage.upload(b"x", "photo_2_0_0.jpg", "image/jpeg").await.unwrap();
        assert_eq!(url, PLACEHOLDER);
        assert!(dir.path().join("photo_2_0_0.jpg").exists());
    }
}

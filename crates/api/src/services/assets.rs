//! Product image hosting.
//!
//! Uploaded images are spooled to a scratch file, pushed to the asset host,
//! and referenced by the hosted URL afterwards. Scratch files are owned by a
//! [`TempUpload`] guard and removed when it drops, whether or not the upload
//! went through.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::CloudinaryConfig;

/// Cloudinary API base URL.
const BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// Errors that can occur when storing images.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Writing or reading the scratch file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A service that stores images and hands back public URLs.
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Upload the image at `path` and return its public URL.
    async fn upload_image(&self, path: &Path) -> Result<String, AssetError>;
}

/// A scratch copy of an uploaded file. Deleted on drop.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `bytes` to a fresh file in `dir`.
    ///
    /// The original file name only contributes its extension.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Io` if the file cannot be written.
    pub async fn write(
        dir: &Path,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, AssetError> {
        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase);

        let mut file_name = format!("upload-{}", Uuid::new_v4());
        if let Some(ext) = extension {
            file_name.push('.');
            file_name.push_str(&ext);
        }

        // The guard exists before the write so a partial file is removed too
        let upload = Self {
            path: dir.join(file_name),
        };
        tokio::fs::write(&upload.path, bytes).await?;
        Ok(upload)
    }

    /// Location of the scratch file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp upload");
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Cloudinary upload API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    upload_url: String,
    api_key: String,
    api_secret: SecretString,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, AssetError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            upload_url: format!("{BASE_URL}/{}/image/upload", config.cloud_name),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// Sign the upload parameters.
    fn sign(&self, timestamp: i64) -> String {
        signature(timestamp, self.api_secret.expose_secret())
    }
}

/// Hex SHA-256 over the sorted parameters followed by the API secret.
fn signature(timestamp: i64, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("timestamp={timestamp}{api_secret}").as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl AssetHost for CloudinaryClient {
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    async fn upload_image(&self, path: &Path) -> Result<String, AssetError> {
        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());

        let timestamp = chrono::Utc::now().timestamp();
        let form = Form::new()
            .part("file", Part::bytes(contents).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature_algorithm", "sha256")
            .text("signature", self.sign(timestamp));

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssetError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AssetError::Parse(e.to_string()))?;

        Ok(uploaded.secure_url)
    }
}

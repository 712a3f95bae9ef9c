//! Cover image storage
//!
//! Uploaded and downloaded images are stored flat in the upload directory
//! under a random name, `<uuid hex>.<ext>`.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Accepted upload extensions (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Maximum accepted image upload size
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Browser-like agent; some cover hosts refuse unknown clients
const DOWNLOAD_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("File type not allowed: {0}")]
    DisallowedType(String),

    #[error("Image storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

/// Lower-cased extension of an allowed file name
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Writes cover images into the upload directory
pub struct ImageStore {
    upload_dir: PathBuf,
    http_client: reqwest::Client,
}

impl ImageStore {
    pub fn new(upload_dir: impl Into<PathBuf>, timeout_secs: u64) -> Result<Self, ImageError> {
        let http_client = reqwest::Client::builder()
            .user_agent(DOWNLOAD_USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ImageError::Setup(e.to_string()))?;

        Ok(Self {
            upload_dir: upload_dir.into(),
            http_client,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Store an uploaded image and return its new file name
    pub async fn save_upload(&self, original_name: &str, data: &[u8]) -> Result<String, ImageError> {
        let ext = allowed_extension(original_name)
            .ok_or_else(|| ImageError::DisallowedType(original_name.to_string()))?;
        let filename = self.write(&ext, data).await?;
        info!(original = %original_name, stored = %filename, "Stored uploaded image");
        Ok(filename)
    }

    /// Download a remote cover into the upload directory
    ///
    /// Returns `None` on any failure; the failure is logged.
    pub async fn download_remote(&self, url: &str) -> Option<String> {
        let ext = if url.to_ascii_lowercase().contains("png") {
            "png"
        } else {
            "jpg"
        };

        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Cover download failed");
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            warn!(url = %url, status = response.status().as_u16(), "Cover download rejected");
            return None;
        }
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %url, error = %e, "Cover download interrupted");
                return None;
            }
        };

        match self.write(ext, &bytes).await {
            Ok(filename) => {
                debug!(url = %url, stored = %filename, "Stored remote cover");
                Some(filename)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Could not store remote cover");
                None
            }
        }
    }

    async fn write(&self, ext: &str, data: &[u8]) -> Result<String, ImageError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let filename = format!("{}.{}", Uuid::new_v4().simple(), ext);
        tokio::fs::write(self.upload_dir.join(&filename), data).await?;
        Ok(filename)
    }
}

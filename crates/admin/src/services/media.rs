//! Cloudinary client for product image uploads.
//!
//! Uploads are signed: the request carries `api_key`, `timestamp` and a
//! SHA-256 signature over the sorted upload parameters followed by the API
//! secret. The secret itself never leaves the server.
//!
//! # API Reference
//!
//! - Upload URL: `https://api.cloudinary.com/v1_1/<cloud>/image/upload`
//! - Authentication: signed parameters (`signature_algorithm=sha256`)

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CloudinaryConfig;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Image types the catalog accepts.
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Errors that can occur when uploading media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cloudinary rejected the upload.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The file is not a supported image type.
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    /// The file is larger than [`MAX_IMAGE_BYTES`].
    #[error("image is larger than 5 MB")]
    TooLarge,

    /// The file is empty.
    #[error("image is empty")]
    Empty,
}

impl MediaError {
    /// Whether the problem is with the file rather than the upstream service.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType(_) | Self::TooLarge | Self::Empty
        )
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloudinary upload client.
#[derive(Clone)]
pub struct CloudinaryClient {
    inner: Arc<CloudinaryClientInner>,
}

struct CloudinaryClientInner {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    folder: String,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(CloudinaryClientInner {
                client,
                cloud_name: config.cloud_name.clone(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                folder: config.folder.clone(),
            }),
        })
    }

    /// Upload an image and return its HTTPS delivery URL.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::UnsupportedType`, `TooLarge` or `Empty` for a bad
    /// file, and `Http`/`Api` if Cloudinary cannot be reached or refuses it.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, MediaError> {
        check_image(content_type, bytes.len())?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", self.inner.folder.as_str()), ("timestamp", timestamp.as_str())],
            self.inner.api_secret.expose_secret(),
        );

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.inner.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.inner.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let url = format!("{API_BASE}/{}/image/upload", self.inner.cloud_name);
        let response = self.inner.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if status.is_success() {
            let body: UploadResponse = response.json().await?;
            tracing::info!(url = %body.secure_url, "Uploaded product image");
            return Ok(body.secure_url);
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map_or_else(|_| "unknown error".to_string(), |e| e.error.message);
        tracing::warn!(status = status.as_u16(), %message, "Cloudinary upload failed");

        Err(MediaError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Refuse files the catalog will not store.
///
/// # Errors
///
/// Returns the first problem found with the file.
pub fn check_image(content_type: &str, len: usize) -> Result<(), MediaError> {
    if len == 0 {
        return Err(MediaError::Empty);
    }
    if !ALLOWED_CONTENT_TYPES.iter().any(|t| *t == content_type) {
        return Err(MediaError::UnsupportedType(content_type.to_string()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge);
    }
    Ok(())
}

/// Signature over `params` (sorted by key, joined as `k=v&k=v`) and the secret.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_params() {
        let a = sign(&[("timestamp", "1700000000"), ("folder", "threadly")], "s3cret");
        let b = sign(&[("folder", "threadly"), ("timestamp", "1700000000")], "s3cret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_sign_matches_manual_digest() {
        let expected = hex::encode(Sha256::digest(b"folder=f&timestamp=1secret"));
        assert_eq!(sign(&[("timestamp", "1"), ("folder", "f")], "secret"), expected);
    }

    #[test]
    fn test_check_image() {
        assert!(check_image("image/png", 1024).is_ok());
        assert!(matches!(check_image("image/png", 0), Err(MediaError::Empty)));
        assert!(matches!(
            check_image("application/pdf", 1024),
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(matches!(
            check_image("image/jpeg", MAX_IMAGE_BYTES + 1),
            Err(MediaError::TooLarge)
        ));
    }
}

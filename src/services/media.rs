// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Media store client for profile images.
//!
//! Uploaded files are first staged on local disk by the HTTP layer. Every
//! upload attempt, successful or not, ends with the staged file removed.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::config::CloudinaryConfig;

/// A file staged on local disk, waiting to be sent to the media store.
#[derive(Debug, Clone)]
pub struct LocalUpload {
    pub path: PathBuf,
    /// Original client-side file name
    pub file_name: String,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub url: String,
}

/// Remote media storage.
///
/// Implementations report failure as `None`; the reason is logged, not returned.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, file: &LocalUpload) -> Option<UploadedMedia>;
}

/// Upload a staged file, then delete it from local disk whatever the outcome.
pub async fn upload_and_discard(
    media: &dyn MediaStore,
    file: &LocalUpload,
) -> Option<UploadedMedia> {
    let uploaded = media.upload(file).await;
    discard(file).await;
    uploaded
}

/// Remove a staged file without uploading it.
pub async fn discard(file: &LocalUpload) {
    if let Err(e) = tokio::fs::remove_file(&file.path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %file.path.display(), error = %e, "Failed to remove staged upload");
        }
    }
}

/// Cloudinary upload API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    base_url: String,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.cloudinary.com/v1_1".to_string(),
            config,
        }
    }

    /// Signature over the signed parameters followed by the API secret.
    fn sign(&self, timestamp: i64) -> String {
        let payload = format!("timestamp={}{}", timestamp, self.config.api_secret);
        hex::encode(Sha256::digest(payload.as_bytes()))
    }

    async fn try_upload(&self, file: &LocalUpload) -> Result<UploadedMedia, String> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| format!("Failed to read staged file: {}", e))?;

        let timestamp = chrono::Utc::now().timestamp();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file.file_name.clone());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature_algorithm", "sha256")
            .text("signature", self.sign(timestamp));

        let url = format!("{}/{}/auto/upload", self.base_url, self.config.cloud_name);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Upload request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Upload rejected ({}): {}", status, body));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid upload response: {}", e))?;

        Ok(UploadedMedia {
            url: body.secure_url,
        })
    }
}

#[async_trait]
impl MediaStore for CloudinaryClient {
    async fn upload(&self, file: &LocalUpload) -> Option<UploadedMedia> {
        match self.try_upload(file).await {
            Ok(media) => {
                tracing::info!(file = %file.file_name, "Uploaded media");
                Some(media)
            }
            Err(e) => {
                tracing::error!(file = %file.file_name, error = %e, "Media upload failed");
                None
            }
        }
    }
}

// Remote publication of a finished bundle
//
// - http: reqwest client for the storage API and presigned PUTs
// - manager: file discovery, worker pool, per-file retry

pub mod http;
pub mod manager;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use http::HttpUploadApi;
pub use manager::{FileUploadResult, UploadManager, UploadOutcome};

use crate::bundle::ViewerBundle;
use crate::config::UploadConfig;
use crate::error::Result;

/// One presigned destination returned by the storage API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub file_name: String,
    pub url: String,
    pub content_type: String,
}

/// Transient: requested fresh for every upload, never written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadManifest {
    pub upload_path: String,
    pub content_id: String,
    pub signs: Vec<SignedUpload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub manifest: ViewerBundle,
    pub files: Vec<FileDescriptor>,
}

/// Outcome of a single presigned PUT
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PutError {
    #[error("storage responded with HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl PutError {
    /// Server errors and network failures are worth another attempt; 4xx never is.
    pub fn is_retryable(&self) -> bool {
        match self {
            PutError::Status(code) => *code >= 500,
            PutError::Network(_) => true,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// `POST /uploads`: register the bundle and receive presigned URLs
    async fn request_upload(&self, request: &UploadRequest) -> Result<UploadManifest>;

    /// `PUT` one file body to a presigned URL
    async fn put_file(&self, url: &str, content_type: &str, body: Vec<u8>) -> std::result::Result<(), PutError>;

    /// `POST /uploads/{contentId}/complete`
    async fn complete(&self, content_id: &str) -> Result<()>;
}

/// Content type for a bundle file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "json" => "application/json",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

pub struct UploadApiFactory;

impl UploadApiFactory {
    pub fn create_api(config: &UploadConfig) -> Result<Arc<dyn UploadApi>> {
        Ok(Arc::new(HttpUploadApi::new(config)?))
    }
}

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{PutError, UploadApi, UploadManifest, UploadRequest};
use crate::config::UploadConfig;
use crate::error::{BundleError, Result};

/// Storage API client. Presigned PUTs carry no bearer token.
pub struct HttpUploadApi {
    client: Client,
    endpoint: String,
    token: String,
}

impl HttpUploadApi {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            BundleError::Config(format!(
                "Upload credential missing: set the {} environment variable",
                config.token_env
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl UploadApi for HttpUploadApi {
    async fn request_upload(&self, request: &UploadRequest) -> Result<UploadManifest> {
        let url = format!("{}/uploads", self.endpoint);
        debug!("Requesting {} signed URLs from {}", request.files.len(), url);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| BundleError::Upload(format!("Upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BundleError::Upload(format!("Storage API error {}: {}", status, error_text)));
        }

        response.json().await
            .map_err(|e| BundleError::Upload(format!("Failed to parse upload manifest: {}", e)))
    }

    async fn put_file(&self, url: &str, content_type: &str, body: Vec<u8>) -> std::result::Result<(), PutError> {
        let response = self.client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| PutError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PutError::Status(status.as_u16()))
        }
    }

    async fn complete(&self, content_id: &str) -> Result<()> {
        let url = format!("{}/uploads/{}/complete", self.endpoint, content_id);
        debug!("Completing upload {}", content_id);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| BundleError::Upload(format!("Completion request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BundleError::Upload(format!("Completion failed {}: {}", status, error_text)));
        }
        Ok(())
    }
}

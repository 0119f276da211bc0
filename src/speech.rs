//! Text-to-speech collaborators.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::SpeechConfig;
use crate::error::{BundleError, Result};

/// Failure of a single synthesis request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpeechError {
    #[error("nothing to synthesize")]
    EmptyInput,

    #[error("speech service responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unusable audio response: {0}")]
    InvalidResponse(String),
}

impl SpeechError {
    /// Rate limits, server errors and broken transfers may clear up; bad
    /// input and other client errors will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpeechError::EmptyInput => false,
            SpeechError::Status { status, .. } => *status == 429 || *status >= 500,
            SpeechError::Network(_) | SpeechError::InvalidResponse(_) => true,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `lang`, returning mp3 bytes
    async fn speak(&self, text: &str, lang: &str) -> std::result::Result<Vec<u8>, SpeechError>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI-compatible `/v1/audio/speech` client
pub struct OpenAiSpeech {
    client: Client,
    config: SpeechConfig,
    api_key: String,
}

impl OpenAiSpeech {
    /// Fails when the API key variable is unset so no work starts without it
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            BundleError::Config(format!(
                "Speech API key missing: set the {} environment variable",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self { client, config, api_key })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn speak(&self, text: &str, lang: &str) -> std::result::Result<Vec<u8>, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyInput);
        }

        let url = format!("{}/v1/audio/speech", self.config.endpoint.trim_end_matches('/'));
        debug!("Requesting {} speech ({} chars) from {}", lang, text.chars().count(), url);

        let request = SpeechRequest {
            model: &self.config.model,
            voice: &self.config.voice,
            input: text,
            response_format: "mp3",
        };

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status { status, body });
        }

        let audio = response.bytes().await
            .map_err(|e| SpeechError::Network(format!("failed to read audio: {}", e)))?;

        if audio.is_empty() {
            return Err(SpeechError::InvalidResponse("empty body".to_string()));
        }

        Ok(audio.to_vec())
    }
}

pub struct SpeechFactory;

impl SpeechFactory {
    pub fn create_synthesizer(config: SpeechConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
        Ok(Arc::new(OpenAiSpeech::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_fails_fast() {
        let config = SpeechConfig {
            endpoint: "http://localhost:1".to_string(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            api_key_env: "MULMO_TEST_SPEECH_KEY_THAT_IS_NEVER_SET".to_string(),
        };

        assert!(matches!(OpenAiSpeech::new(config), Err(BundleError::Config(_))));
    }

    #[test]
    fn test_only_transient_failures_are_retryable() {
        let status = |status| SpeechError::Status { status, body: String::new() };

        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(SpeechError::Network("reset".to_string()).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!SpeechError::EmptyInput.is_retryable());
    }
}

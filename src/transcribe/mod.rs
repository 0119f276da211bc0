// Speech-to-text collaborators
//
// - Whisper: `whisper` command-line tool with JSON output
//
// Other services plug in by implementing TranscriberTrait and mapping their
// output onto Transcript.

pub mod common;
pub mod whisper;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use common::*;
use crate::config::TranscriberConfig;
use crate::error::Result;

/// Main trait for transcription operations
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    /// Transcribe an audio file, optionally hinting the spoken language
    async fn transcribe(&self, audio_path: &Path, language: Option<&str>) -> Result<Transcript>;

    /// Check if the underlying tool or service can be reached
    fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_default(config: TranscriberConfig) -> Arc<dyn TranscriberTrait> {
        Arc::new(whisper::WhisperCliTranscriber::new(config))
    }
}
